//! Liveness, storage connectivity, and metrics endpoints.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use tracing::warn;

use crate::AppState;

/// Health probe body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `unavailable`.
    pub status: &'static str,
    /// Crate version.
    pub version: &'static str,
}

/// `GET /health` — process liveness.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /health/db` — storage connectivity: 200 when a probe query
/// succeeds, 503 otherwise.
pub async fn health_db(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
            }),
        ),
        Err(err) => {
            warn!(error = %err, "database health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    version: env!("CARGO_PKG_VERSION"),
                }),
            )
        }
    }
}

/// `GET /metrics` — Prometheus text format.
pub async fn render_metrics(State(state): State<AppState>) -> String {
    state.metrics.render()
}
