//! Typed settings structs with serde defaults.
//!
//! Every field has a default so a partial `pagepulse.json` deep-merges
//! cleanly over the compiled values.

use serde::{Deserialize, Serialize};

/// Root settings for the pagepulse workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PagepulseSettings {
    /// Ingestion/stats server settings.
    pub server: ServerSettings,
    /// Tracker client settings.
    pub client: ClientSettings,
}

impl Default for PagepulseSettings {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            client: ClientSettings::default(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerSettings {
    /// Bind address.
    pub bind: String,
    /// Listen port.
    pub port: u16,
    /// SQLite database path.
    pub db_path: String,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum request body size in bytes (ingestion batches).
    pub max_body_bytes: usize,
    /// Queries slower than this are logged at WARN, not aborted.
    pub slow_query_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            db_path: "pagepulse.db".to_string(),
            request_timeout_ms: 30_000,
            max_body_bytes: 10 * 1024 * 1024,
            slow_query_ms: 250,
        }
    }
}

/// Tracker client settings.
///
/// The defaults mirror the delivery-guarantee constants: 2 s batch flush,
/// 3 linearly backed-off retries, a 50-event queue with a 100-event
/// durable spill cap, and a 30-minute session inactivity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientSettings {
    /// Ingestion endpoint URL.
    pub endpoint: String,
    /// Periodic flush interval in milliseconds.
    pub batch_interval_ms: u64,
    /// Base retry delay in milliseconds (attempt N waits N × this).
    pub retry_delay_ms: u64,
    /// Maximum delivery attempts per batch before spilling.
    pub max_retries: u32,
    /// Queue length that forces an immediate flush.
    pub max_queue_size: usize,
    /// Maximum events kept in the durable fallback store.
    pub failed_event_cap: usize,
    /// Session inactivity timeout in milliseconds.
    pub session_timeout_ms: i64,
    /// Interval between session keep-alive touches in milliseconds.
    pub touch_interval_ms: u64,
    /// Directory for the client's durable state files. `None` disables
    /// durable state (in-memory only).
    pub state_dir: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:3000/api/events".to_string(),
            batch_interval_ms: 2_000,
            retry_delay_ms: 1_000,
            max_retries: 3,
            max_queue_size: 50,
            failed_event_cap: 100,
            session_timeout_ms: 30 * 60 * 1000,
            touch_interval_ms: 60_000,
            state_dir: None,
        }
    }
}
