//! HTTP error responses.
//!
//! Every failure reaches the caller as a JSON status body. Internal detail is
//! logged where the error is handled and never serialized.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ogsnap_core::Error;
use serde::Serialize;

/// JSON body shared by error and delete responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub message: &'static str,
    pub status_code: u16,
}

impl StatusBody {
    pub fn new(status: StatusCode) -> Self {
        Self { message: status.canonical_reason().unwrap_or("Unknown"), status_code: status.as_u16() }
    }
}

/// Render `status` with its JSON body.
pub fn status_response(status: StatusCode) -> Response {
    (status, Json(StatusBody::new(status))).into_response()
}

/// Error returned by request handlers.
#[derive(Debug, thiserror::Error)]
#[error("{status}")]
pub struct ApiError {
    status: StatusCode,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<&Error> for ApiError {
    fn from(err: &Error) -> Self {
        let status = match err {
            Error::AuthMismatch => StatusCode::BAD_REQUEST,
            _ => StatusCode::NOT_FOUND,
        };
        Self { status }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        status_response(self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_mismatch_is_bad_request() {
        assert_eq!(ApiError::from(&Error::AuthMismatch).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_other_failures_are_not_found() {
        for err in [
            Error::NonOkResponse(500),
            Error::CaptureFailed("crash".into()),
            Error::CaptureSaturated(10_000),
            Error::StoreUnavailable("403".into()),
            Error::DeleteUnsupported,
        ] {
            assert_eq!(ApiError::from(&err).status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_status_body_shape() {
        let body = serde_json::to_value(StatusBody::new(StatusCode::NOT_FOUND)).unwrap();
        assert_eq!(body, serde_json::json!({ "message": "Not Found", "statusCode": 404 }));
    }
}
