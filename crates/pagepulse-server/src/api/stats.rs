//! Aggregation read endpoints.

use axum::Json;
use axum::extract::{Query, State};
use pagepulse_storage::row_types::BucketCount;
use pagepulse_storage::{StatsSummary, TimeWindow};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// `GET /api/stats` — dashboard summary.
///
/// Empty storage yields zero-valued fields, never an error.
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsSummary>, ApiError> {
    Ok(Json(state.store.stats()?))
}

/// Query parameters for the time-series endpoint.
#[derive(Debug, Deserialize)]
pub struct TimeseriesParams {
    /// `day` (hourly buckets) or `week` (daily buckets). Defaults to `day`.
    pub window: Option<String>,
}

/// Response for the time-series endpoint.
#[derive(Debug, Serialize)]
pub struct TimeseriesResponse {
    /// Echoed window name.
    pub window: &'static str,
    /// Click counts per bucket; empty buckets are absent.
    pub buckets: Vec<BucketCount>,
}

/// `GET /api/stats/timeseries?window=day|week` — click time series.
pub async fn get_timeseries(
    State(state): State<AppState>,
    Query(params): Query<TimeseriesParams>,
) -> Result<Json<TimeseriesResponse>, ApiError> {
    let window: TimeWindow = params.window.as_deref().unwrap_or("day").parse()?;
    let buckets = state.store.click_timeseries(window)?;
    Ok(Json(TimeseriesResponse {
        window: match window {
            TimeWindow::Day => "day",
            TimeWindow::Week => "week",
        },
        buckets,
    }))
}
