//! API error type and status-code mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use pagepulse_storage::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by API handlers, mapped onto HTTP statuses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or oversized request — 400. Never retried by clients.
    #[error("{0}")]
    BadRequest(String),

    /// Unknown resource — 404.
    #[error("{0}")]
    NotFound(String),

    /// Storage connectivity failure — 503.
    #[error("{0}")]
    Unavailable(String),

    /// Anything unexpected — 500. The batch transaction was rolled back;
    /// clients treat this like a transient failure and retry.
    #[error("internal error")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(reason) => Self::BadRequest(reason),
            StoreError::SessionNotFound(id) => Self::NotFound(format!("session not found: {id}")),
            other => {
                error!(error = %other, "storage failure");
                Self::Internal(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            // Internal details stay in the logs, not on the wire
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
