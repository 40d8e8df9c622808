//! # pagepulse-core
//!
//! Foundation types shared across the pagepulse crates.
//!
//! This crate provides the vocabulary the rest of the workspace depends on:
//!
//! - **Events**: [`events::TrackedEvent`] and [`events::EventType`] — the wire
//!   and storage representation of a single analytics event
//! - **Page context**: [`events::PageContext`] — URL/referrer pair supplied by
//!   the embedding application when tracking
//! - **Errors**: [`errors::CoreError`] for shared parse/validation failures
//! - **Time**: [`time`] helpers for RFC3339 timestamps and epoch millis
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other pagepulse crates.

#![deny(unsafe_code)]

pub mod errors;
pub mod events;
pub mod time;

pub use errors::{CoreError, Result};
pub use events::{EventType, PageContext, TrackedEvent};
