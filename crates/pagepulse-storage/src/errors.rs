//! Storage error hierarchy.

use thiserror::Error;

/// Errors surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool exhaustion or checkout failure.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// A batch (or an event within it) failed validation. Maps to 400 —
    /// the whole batch is rejected, nothing is committed.
    #[error("invalid batch: {0}")]
    Validation(String),

    /// Session lookup miss on a detail query.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// Anything else — migrations, invariant breaches.
    #[error("storage internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Validation failure for the event at `index` in a batch.
    pub fn invalid_event(index: usize, reason: impl std::fmt::Display) -> Self {
        Self::Validation(format!("event[{index}]: {reason}"))
    }
}

/// Result alias for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;
