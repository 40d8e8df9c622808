//! HTTP handlers, one module per resource.

pub mod health;
pub mod ingest;
pub mod sessions;
pub mod stats;
