//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OGSNAP_*)
//! 2. Legacy deployment variables (BUCKET_NAME, AUTH_TOKEN, AWS_*)
//! 3. TOML config file (if OGSNAP_CONFIG_FILE set)
//! 4. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Deployment variables understood without the `OGSNAP_` prefix.
const LEGACY_ENV: &[&str] = &[
    "BUCKET_NAME",
    "AUTH_TOKEN",
    "AWS_ENDPOINT_URL_S3",
    "AWS_REGION",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
];

/// Which content store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Remote S3-compatible bucket; hits are served by redirect.
    Durable,
    /// Local directory wiped at startup; entries expire after `cache_ttl_ms`.
    #[default]
    Ephemeral,
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OGSNAP_*)
/// 2. Legacy deployment variables
/// 3. TOML config file (if OGSNAP_CONFIG_FILE set)
/// 4. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site whose pages are captured.
    ///
    /// Set via OGSNAP_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Listen address for the HTTP server.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Store backend: `durable` or `ephemeral`.
    #[serde(default)]
    pub backend: StoreBackend,

    /// Secret compared against the `X-Snap-Token` header on DELETE.
    ///
    /// Set via OGSNAP_AUTH_TOKEN or AUTH_TOKEN.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Bucket holding durable snapshots.
    ///
    /// Set via OGSNAP_BUCKET_NAME or BUCKET_NAME.
    #[serde(default)]
    pub bucket_name: Option<String>,

    /// S3-compatible endpoint.
    ///
    /// Set via OGSNAP_S3_ENDPOINT or AWS_ENDPOINT_URL_S3.
    #[serde(default)]
    pub s3_endpoint: Option<String>,

    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    #[serde(default)]
    pub s3_access_key_id: Option<String>,

    #[serde(default)]
    pub s3_secret_access_key: Option<String>,

    /// Base used to build redirect URLs on durable hits. Defaults to `s3_endpoint`.
    #[serde(default)]
    pub public_url: Option<String>,

    /// Directory for the ephemeral store. Wiped at startup.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Time-to-live of ephemeral entries in milliseconds.
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Interval between sweeps of expired ephemeral entries.
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,

    /// Upper bound on one capture, navigation through screenshot.
    #[serde(default = "default_render_timeout_ms")]
    pub render_timeout_ms: u64,

    /// Quiet window for the network-idle heuristic.
    #[serde(default = "default_idle_window_ms")]
    pub idle_window_ms: u64,

    /// In-flight requests still counted as idle.
    #[serde(default = "default_idle_max_inflight")]
    pub idle_max_inflight: usize,

    /// Rendering contexts open at once.
    #[serde(default = "default_max_concurrent_captures")]
    pub max_concurrent_captures: usize,

    /// How long a capture waits for a free rendering context.
    #[serde(default = "default_capture_queue_timeout_ms")]
    pub capture_queue_timeout_ms: u64,

    #[serde(default = "default_device_scale_factor")]
    pub device_scale_factor: f64,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
}

fn default_origin() -> String {
    "https://changelog.com".into()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".into()
}

fn default_s3_region() -> String {
    "us-east-1".into()
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("ogsnap")
}

fn default_cache_ttl_ms() -> u64 {
    600_000 // 10 minutes
}

fn default_reap_interval_ms() -> u64 {
    60_000
}

fn default_render_timeout_ms() -> u64 {
    30_000
}

fn default_idle_window_ms() -> u64 {
    500
}

fn default_idle_max_inflight() -> usize {
    2
}

fn default_max_concurrent_captures() -> usize {
    4
}

fn default_capture_queue_timeout_ms() -> u64 {
    10_000
}

fn default_device_scale_factor() -> f64 {
    1.0
}

fn default_jpeg_quality() -> u8 {
    90
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            bind_addr: default_bind_addr(),
            backend: StoreBackend::default(),
            auth_token: None,
            bucket_name: None,
            s3_endpoint: None,
            s3_region: default_s3_region(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            public_url: None,
            cache_dir: default_cache_dir(),
            cache_ttl_ms: default_cache_ttl_ms(),
            reap_interval_ms: default_reap_interval_ms(),
            render_timeout_ms: default_render_timeout_ms(),
            idle_window_ms: default_idle_window_ms(),
            idle_max_inflight: default_idle_max_inflight(),
            max_concurrent_captures: default_max_concurrent_captures(),
            capture_queue_timeout_ms: default_capture_queue_timeout_ms(),
            device_scale_factor: default_device_scale_factor(),
            jpeg_quality: default_jpeg_quality(),
            chrome_executable: None,
        }
    }
}

impl AppConfig {
    /// Ephemeral entry TTL as Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OGSNAP_`
    /// 2. Legacy variables (`BUCKET_NAME`, `AUTH_TOKEN`, `AWS_ENDPOINT_URL_S3`,
    ///    `AWS_REGION`, `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`)
    /// 3. TOML file from `OGSNAP_CONFIG_FILE` (if set)
    /// 4. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OGSNAP_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment
            .merge(Env::raw().only(LEGACY_ENV).map(|key| legacy_field(key.as_str()).into()))
            .merge(
                Env::prefixed("OGSNAP_")
                    .ignore(&["CONFIG_FILE"])
                    .map(|key| key.as_str().to_lowercase().into())
                    .split("__"),
            );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Delete secret, if one is configured.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no auth token is set or it is empty.
    pub fn require_auth_token(&self) -> Result<&str, ConfigError> {
        self.auth_token.as_deref().filter(|token| !token.is_empty()).ok_or_else(|| ConfigError::Missing {
            field: "auth_token".into(),
            hint: "Set OGSNAP_AUTH_TOKEN or AUTH_TOKEN environment variable".into(),
        })
    }
}

fn legacy_field(var: &str) -> String {
    match var.to_ascii_uppercase().as_str() {
        "AWS_ENDPOINT_URL_S3" => "s3_endpoint".into(),
        "AWS_REGION" => "s3_region".into(),
        "AWS_ACCESS_KEY_ID" => "s3_access_key_id".into(),
        "AWS_SECRET_ACCESS_KEY" => "s3_secret_access_key".into(),
        other => other.to_lowercase(),
    }
}
