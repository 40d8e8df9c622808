//! Batch ingestion endpoint.

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;
use serde_json::Value;
use tracing::instrument;

use crate::AppState;
use crate::error::ApiError;
use crate::metrics::{INGEST_REJECTED_TOTAL, INGEST_REQUESTS_TOTAL};

/// Response for a fully committed batch.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Human-readable confirmation.
    pub message: &'static str,
    /// Events written.
    pub count: usize,
}

/// `POST /api/events` — ingest a batch of events atomically.
///
/// The body must be a JSON array of 1–100 event objects, each carrying
/// `session_id`, `event_type`, and `url`. The batch commits all-or-nothing:
/// the first invalid event rejects the whole batch with 400 and nothing is
/// persisted. An unexpected storage failure rolls back and returns 500.
#[instrument(skip(state, headers, body))]
pub async fn ingest_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Some(batch) = body.as_array() else {
        metrics::counter!(INGEST_REJECTED_TOTAL).increment(1);
        return Err(ApiError::BadRequest("payload must be a JSON array".to_string()));
    };

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(String::from);

    // The transaction blocks (and may sleep on SQLITE_BUSY) — keep it off
    // the async workers.
    let store = std::sync::Arc::clone(&state.store);
    let batch = batch.clone();
    let count = tokio::task::spawn_blocking(move || store.ingest_batch(&batch, user_agent.as_deref()))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .inspect_err(|_| metrics::counter!(INGEST_REJECTED_TOTAL).increment(1))?;

    metrics::counter!(INGEST_REQUESTS_TOTAL).increment(1);
    Ok(Json(IngestResponse {
        message: "events recorded",
        count,
    }))
}
