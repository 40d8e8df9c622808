//! Prometheus metrics recorder and name constants.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the `PrometheusHandle` used to render the `/metrics` endpoint.
/// Must be called once at server startup before any metrics are recorded.
pub fn install_recorder() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install metrics recorder");
    info!("prometheus metrics recorder installed");
    handle
}

// Metric name constants to avoid typos. The storage layer records its own
// ingest counters and histogram alongside these.

/// Batches accepted (counter).
pub const INGEST_REQUESTS_TOTAL: &str = "ingest_requests_total";
/// Batches rejected for validation reasons (counter).
pub const INGEST_REJECTED_TOTAL: &str = "ingest_rejected_total";
