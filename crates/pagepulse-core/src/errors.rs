//! Shared error types for pagepulse crates.

use thiserror::Error;

/// Errors produced by core types (parsing, field validation).
#[derive(Debug, Error)]
pub enum CoreError {
    /// An event type string didn't match any known variant.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// A required event field was missing or empty.
    #[error("missing required event field: {0}")]
    MissingField(&'static str),

    /// A timestamp string failed RFC3339 parsing.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
