//! Stateless per-table repositories. Every method takes `&Connection` so
//! callers control transaction boundaries.

pub mod event;
pub mod session;
