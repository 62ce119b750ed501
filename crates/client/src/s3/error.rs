//! S3 client error types.

use std::sync::Arc;

/// Errors from the S3-compatible object store client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum S3Error {
    /// Required setting absent from the application config.
    #[error("missing S3 setting: {0}")]
    MissingSetting(&'static str),

    /// Endpoint is not an absolute http(s) URL.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Object does not exist.
    #[error("object not found")]
    NotFound,

    /// Credentials rejected or bucket policy denies the operation.
    #[error("access denied ({status})")]
    Forbidden { status: u16 },

    /// Any other non-success response.
    #[error("HTTP error: {status}")]
    HttpError { status: u16 },

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),
}

impl S3Error {
    /// Classify a non-success status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            404 => S3Error::NotFound,
            401 | 403 => S3Error::Forbidden { status },
            _ => S3Error::HttpError { status },
        }
    }
}

impl From<reqwest::Error> for S3Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { S3Error::Timeout } else { S3Error::Network(Arc::new(err)) }
    }
}

impl From<S3Error> for ogsnap_core::Error {
    fn from(err: S3Error) -> Self {
        ogsnap_core::Error::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(S3Error::from_status(404), S3Error::NotFound));
        assert!(matches!(S3Error::from_status(403), S3Error::Forbidden { status: 403 }));
        assert!(matches!(S3Error::from_status(503), S3Error::HttpError { status: 503 }));
    }

    #[test]
    fn test_into_store_unavailable() {
        let err: ogsnap_core::Error = S3Error::Forbidden { status: 403 }.into();
        assert!(matches!(err, ogsnap_core::Error::StoreUnavailable(msg) if msg.contains("403")));
    }
}
