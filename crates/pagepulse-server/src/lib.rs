//! # pagepulse-server
//!
//! Axum HTTP surface over the analytics store.
//!
//! Routes:
//!
//! - `POST /api/events` — batch ingestion (JSON array, max 100 events)
//! - `GET /api/stats` — dashboard summary statistics
//! - `GET /api/stats/timeseries?window=day|week` — click time series
//! - `GET /api/sessions` — latest 50 sessions
//! - `GET /api/sessions/{id}` — full session detail
//! - `GET /health`, `GET /health/db` — liveness and storage connectivity
//! - `GET /metrics` — Prometheus text format

#![deny(unsafe_code)]

pub mod api;
pub mod error;
pub mod metrics;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use pagepulse_settings::ServerSettings;
use pagepulse_storage::AnalyticsStore;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The analytics store.
    pub store: Arc<AnalyticsStore>,
    /// Handle for rendering `/metrics`.
    pub metrics: PrometheusHandle,
}

/// Build the application router.
pub fn build_router(state: AppState, settings: &ServerSettings) -> Router {
    Router::new()
        .route("/api/events", post(api::ingest::ingest_events))
        .route("/api/stats", get(api::stats::get_stats))
        .route("/api/stats/timeseries", get(api::stats::get_timeseries))
        .route("/api/sessions", get(api::sessions::list_sessions))
        .route("/api/sessions/{id}", get(api::sessions::get_session))
        .route("/health", get(api::health::health))
        .route("/health/db", get(api::health::health_db))
        .route("/metrics", get(api::health::render_metrics))
        .layer(DefaultBodyLimit::max(settings.max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_millis(settings.request_timeout_ms)))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
