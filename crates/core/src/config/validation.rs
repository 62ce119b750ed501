//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, StoreBackend};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an absolute http(s) URL
    /// - `cache_ttl_ms`, `reap_interval_ms` or `max_concurrent_captures` is 0
    /// - `render_timeout_ms` is below 1s or above 5 minutes
    /// - `device_scale_factor` is outside (0, 4]
    /// - `jpeg_quality` is outside 1..=100
    ///
    /// Returns `ConfigError::Missing` if the durable backend is selected
    /// without bucket, endpoint, or credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.origin) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => {}
            Ok(url) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported scheme: {}", url.scheme()),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.cache_ttl_ms == 0 {
            return Err(ConfigError::Invalid { field: "cache_ttl_ms".into(), reason: "must be greater than 0".into() });
        }
        if self.reap_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "reap_interval_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.render_timeout_ms < 1_000 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must be at least 1000ms".into(),
            });
        }
        if self.render_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "render_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_concurrent_captures == 0 {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_captures".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if !(self.device_scale_factor > 0.0 && self.device_scale_factor <= 4.0) {
            return Err(ConfigError::Invalid {
                field: "device_scale_factor".into(),
                reason: "must be in (0, 4]".into(),
            });
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::Invalid { field: "jpeg_quality".into(), reason: "must be in 1..=100".into() });
        }

        if self.backend == StoreBackend::Durable {
            self.validate_durable()?;
        }

        Ok(())
    }

    fn validate_durable(&self) -> Result<(), ConfigError> {
        let required = [
            ("bucket_name", self.bucket_name.as_deref(), "OGSNAP_BUCKET_NAME or BUCKET_NAME"),
            ("s3_endpoint", self.s3_endpoint.as_deref(), "OGSNAP_S3_ENDPOINT or AWS_ENDPOINT_URL_S3"),
            ("s3_access_key_id", self.s3_access_key_id.as_deref(), "OGSNAP_S3_ACCESS_KEY_ID or AWS_ACCESS_KEY_ID"),
            (
                "s3_secret_access_key",
                self.s3_secret_access_key.as_deref(),
                "OGSNAP_S3_SECRET_ACCESS_KEY or AWS_SECRET_ACCESS_KEY",
            ),
        ];

        for (field, value, var) in required {
            if value.is_none_or(str::is_empty) {
                return Err(ConfigError::Missing {
                    field: field.into(),
                    hint: format!("durable backend requires {var}"),
                });
            }
        }

        Ok(())
    }
}
