//! HTTP routes.
//!
//! `GET` requests for any path are answered with a snapshot or a redirect.
//! `DELETE` routes are only mounted when the store can delete entries.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use ogsnap_core::{Error, Snapshot};

use crate::error::{ApiError, status_response};
use crate::orchestrator::{Orchestrator, Reply};

/// Header carrying the delete secret.
pub const TOKEN_HEADER: &str = "x-snap-token";

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    let (root, page) = if orchestrator.supports_delete() {
        (get(fetch).delete(remove), get(fetch).delete(remove))
    } else {
        (get(fetch), get(fetch))
    };

    Router::new()
        .route("/", root)
        .route("/{*path}", page)
        .method_not_allowed_fallback(not_allowed)
        .with_state(orchestrator)
}

async fn not_allowed() -> Response {
    status_response(StatusCode::METHOD_NOT_ALLOWED)
}

fn request_path(uri: &Uri) -> &str {
    uri.path_and_query().map_or("/", |pq| pq.as_str())
}

fn reject(path: &str, err: &Error) -> ApiError {
    let api = ApiError::from(err);
    tracing::warn!(path, code = err.code(), error = %err, status = %api.status(), "request failed");
    api
}

async fn fetch(State(orchestrator): State<Arc<Orchestrator>>, uri: Uri) -> Result<Response, ApiError> {
    let path = request_path(&uri);

    match orchestrator.get(path).await {
        Ok(Reply::Redirect(location)) => Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response()),
        Ok(Reply::Image(bytes)) => Ok(([(header::CONTENT_TYPE, Snapshot::CONTENT_TYPE)], bytes).into_response()),
        Err(err) => Err(reject(path, &err)),
    }
}

async fn remove(
    State(orchestrator): State<Arc<Orchestrator>>, uri: Uri, headers: HeaderMap,
) -> Result<Response, ApiError> {
    let path = request_path(&uri);
    let token = headers.get(TOKEN_HEADER).and_then(|value| value.to_str().ok());

    match orchestrator.delete(path, token).await {
        Ok(()) => Ok(status_response(StatusCode::OK)),
        Err(err) => Err(reject(path, &err)),
    }
}
