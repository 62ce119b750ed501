//! Client code for ogsnap.
//!
//! This crate provides the outbound side of the service: building origin
//! page URLs, capturing pages in a headless browser, and the S3-compatible
//! durable store.

pub mod origin;
pub mod render;
pub mod s3;

pub use origin::{Origin, UrlError};
#[cfg(feature = "render")]
pub use render::HeadlessCapturer;
pub use render::{CaptureConfig, RenderError, SnapshotCapturer};
pub use s3::{DurableStore, S3Config, S3Error};
