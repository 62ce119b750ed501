//! Headless browser page capture.
//!
//! This module provides the capturer trait used by the server and, behind
//! the `render` feature, an implementation driving headless Chrome/Chromium
//! through chromiumoxide.

#[cfg(feature = "render")]
mod headless;
#[cfg(feature = "render")]
mod idle;

#[cfg(feature = "render")]
pub use headless::HeadlessCapturer;

use std::path::PathBuf;
use std::time::Duration;

use ogsnap_core::{AppConfig, Error, Snapshot};
use thiserror::Error;
use url::Url;

/// Errors that can occur during page capture.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Failed to launch or connect to browser.
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    /// Failed to open a page or navigate to URL.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// The main document answered with a non-200 status.
    #[error("origin answered {0}")]
    NonOkStatus(u16),

    /// Viewport override or screenshot failed.
    #[error("screenshot failed: {0}")]
    Screenshot(String),

    /// Capture did not finish in time.
    #[error("render timeout after {0}ms")]
    Timeout(u64),

    /// Every rendering context stayed busy for the whole queue timeout.
    #[error("no render slot within {0}ms")]
    Saturated(u64),

    /// Browser closed unexpectedly or was stopped.
    #[error("browser closed")]
    BrowserClosed,
}

impl From<RenderError> for Error {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::NonOkStatus(status) => Error::NonOkResponse(status),
            RenderError::Saturated(ms) => Error::CaptureSaturated(ms),
            other => Error::CaptureFailed(other.to_string()),
        }
    }
}

/// Capture settings.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Viewport in CSS pixels (default: 1200x630).
    pub viewport: (u32, u32),

    pub device_scale_factor: f64,

    pub jpeg_quality: u8,

    /// Upper bound for one capture in milliseconds (default: 30000).
    pub timeout_ms: u64,

    /// The page counts as loaded once at most `idle_max_inflight` requests
    /// stay open for `idle_window_ms`.
    pub idle_window_ms: u64,
    pub idle_max_inflight: usize,

    /// Rendering contexts open at once.
    pub max_concurrent: usize,

    /// How long a capture waits for a free context.
    pub queue_timeout_ms: u64,

    pub chrome_executable: Option<PathBuf>,
}

impl CaptureConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            viewport: (1200, 630),
            device_scale_factor: 1.0,
            jpeg_quality: 90,
            timeout_ms: 30_000,
            idle_window_ms: 500,
            idle_max_inflight: 2,
            max_concurrent: 4,
            queue_timeout_ms: 10_000,
            chrome_executable: None,
        }
    }
}

impl From<&AppConfig> for CaptureConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            device_scale_factor: config.device_scale_factor,
            jpeg_quality: config.jpeg_quality,
            timeout_ms: config.render_timeout_ms,
            idle_window_ms: config.idle_window_ms,
            idle_max_inflight: config.idle_max_inflight,
            max_concurrent: config.max_concurrent_captures,
            queue_timeout_ms: config.capture_queue_timeout_ms,
            chrome_executable: config.chrome_executable.clone(),
            ..Default::default()
        }
    }
}

/// Produces a viewport snapshot for a fully-qualified page URL.
#[async_trait::async_trait]
pub trait SnapshotCapturer: Send + Sync {
    /// Capture `url`.
    ///
    /// Fails with `Error::NonOkResponse` when the page does not answer 200,
    /// and with `Error::CaptureFailed` or `Error::CaptureSaturated` when the
    /// engine cannot produce an image.
    async fn capture(&self, url: &Url) -> Result<Snapshot, Error>;
}
