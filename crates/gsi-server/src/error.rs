//! Error types for the HTTP layer.
//!
//! [`ApiError`] unifies all request-level failures into a single enum that
//! converts into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use gsi_core::IngestError;

/// Errors that can occur while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested client is unknown.
    #[error("not found: {0}")]
    NotFound(String),

    /// The snapshot credential was rejected.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request body could not be read or was not a JSON object.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The ingest task failed to complete.
    #[error("internal error: {0}")]
    Internal(String),

    /// A serialization error while building a response.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::AuthRejected { .. } => Self::Unauthorized(err.to_string()),
            IngestError::MalformedPayload(msg) => Self::BadRequest(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
