//! # pagepulse-storage
//!
//! SQLite persistence for ingested analytics events.
//!
//! Layers, bottom up:
//!
//! - [`connection`] — r2d2 connection pool with WAL and pragma setup
//! - [`migrations`] — versioned schema, applied at pool creation
//! - [`repositories`] — stateless per-table repos taking `&Connection`
//! - [`store`] — [`store::AnalyticsStore`], the transactional batch-ingest
//!   and read-query API the server uses
//!
//! Every batch ingest runs inside a single transaction: callers never
//! observe a partially committed batch.

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod row_types;
pub mod store;

pub use connection::{ConnectionPool, PooledConnection};
pub use errors::{Result, StoreError};
pub use store::{
    AnalyticsStore, INGEST_BATCH_DURATION_SECONDS, INGEST_BATCHES_TOTAL, INGEST_EVENTS_TOTAL,
    SessionDetail, StatsSummary, TimeWindow,
};
