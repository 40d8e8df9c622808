//! Session listing and detail endpoints.

use axum::Json;
use axum::extract::{Path, State};
use pagepulse_storage::SessionDetail;
use pagepulse_storage::row_types::SessionSummaryRow;
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

/// Response for the session listing.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    /// Latest sessions, most recent first.
    pub sessions: Vec<SessionSummaryRow>,
}

/// `GET /api/sessions` — latest 50 sessions with computed duration and
/// click totals.
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<SessionListResponse>, ApiError> {
    Ok(Json(SessionListResponse {
        sessions: state.store.recent_sessions()?,
    }))
}

/// `GET /api/sessions/{id}` — one session with chronological events,
/// per-URL page rollups, and clicks. 404 for an unknown id.
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetail>, ApiError> {
    Ok(Json(state.store.session_detail(&session_id)?))
}
