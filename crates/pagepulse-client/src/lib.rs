//! # pagepulse-client
//!
//! Embeddable analytics tracker with delivery guarantees.
//!
//! Layers, bottom up:
//!
//! - [`state_store`] — best-effort durable key/value storage with silent
//!   in-memory fallback when unavailable
//! - [`session`] — [`session::SessionManager`]: stable session ids with
//!   inactivity-based expiry
//! - [`buffer`] — [`buffer::EventBuffer`]: bounded FIFO queue, single-flight
//!   batched flushes, linear-backoff retry, durable spill and recovery
//! - [`tracker`] — [`tracker::Tracker`]: owned top-level instance wiring the
//!   pieces together with periodic flush and session keep-alive timers
//!
//! Delivery is at-least-once: a batch that commits server-side but times out
//! client-side will be retried and ingested again.
//!
//! # Usage
//!
//! ```no_run
//! use pagepulse_client::{PageContext, Tracker};
//! use pagepulse_settings::ClientSettings;
//!
//! # async fn run() {
//! let tracker = Tracker::new(ClientSettings::default());
//! tracker.track_pageview(&PageContext::new("https://example.com/pricing"));
//! tracker.destroy().await;
//! # }
//! ```

#![deny(unsafe_code)]

pub mod buffer;
pub mod errors;
pub mod session;
pub mod state_store;
pub mod tracker;

pub use buffer::{EventBuffer, FlushMode};
pub use errors::{ClientError, Result};
pub use pagepulse_core::{EventType, PageContext, TrackedEvent};
pub use session::SessionManager;
pub use state_store::{FileStateStore, MemoryStateStore, StateStore};
pub use tracker::Tracker;
