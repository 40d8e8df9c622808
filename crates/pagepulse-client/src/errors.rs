//! Client-side error types.

use thiserror::Error;

/// Errors surfaced by the tracker client.
///
/// Most delivery failures are handled internally (retry or spill) and never
/// reach callers; these types exist for the HTTP layer's own bookkeeping and
/// for construction-time failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (DNS, connect, timeout). Transient.
    #[error("delivery transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server rejected the batch with a 4xx. Terminal — retrying an
    /// invalid batch can never succeed.
    #[error("batch rejected with status {status}")]
    Rejected {
        /// HTTP status code.
        status: u16,
    },

    /// The server failed with a 5xx. Transient — treated like a network
    /// failure.
    #[error("server error, status {status}")]
    ServerError {
        /// HTTP status code.
        status: u16,
    },
}

impl ClientError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
