//! Unified error types for ogsnap.

/// Unified error types for the snapshot service.
///
/// Variants carry plain strings so the error can be cloned and handed to
/// every request waiting on the same capture.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The origin answered the page navigation with something other than 200.
    #[error("NON_OK_RESPONSE: origin answered {0}")]
    NonOkResponse(u16),

    /// The rendering engine failed (navigation timeout, crash, no context).
    #[error("CAPTURE_FAILED: {0}")]
    CaptureFailed(String),

    /// No rendering slot became free within the queue timeout.
    #[error("CAPTURE_SATURATED: no render slot within {0}ms")]
    CaptureSaturated(u64),

    /// Store transport or permission failure.
    #[error("STORE_UNAVAILABLE: {0}")]
    StoreUnavailable(String),

    /// The entry disappeared between the existence check and the read.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Key cannot name a stored object.
    #[error("INVALID_KEY: {0:?}")]
    InvalidKey(String),

    /// Origin URL could not be built for the request path.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Delete token did not match the configured secret.
    #[error("AUTH_MISMATCH")]
    AuthMismatch,

    /// The configured store does not support explicit deletes.
    #[error("DELETE_UNSUPPORTED")]
    DeleteUnsupported,
}

impl Error {
    /// Stable code prefix used in logs.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NonOkResponse(_) => "NON_OK_RESPONSE",
            Error::CaptureFailed(_) => "CAPTURE_FAILED",
            Error::CaptureSaturated(_) => "CAPTURE_SATURATED",
            Error::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Error::CacheMiss(_) => "CACHE_MISS",
            Error::InvalidKey(_) => "INVALID_KEY",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::AuthMismatch => "AUTH_MISMATCH",
            Error::DeleteUnsupported => "DELETE_UNSUPPORTED",
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}
