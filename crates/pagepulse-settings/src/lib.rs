//! # pagepulse-settings
//!
//! Configuration management with layered sources.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`PagepulseSettings::default()`]
//! 2. **JSON file** — `pagepulse.json` (deep-merged over defaults)
//! 3. **Environment variables** — `PAGEPULSE_*` overrides (highest priority)
//!
//! There is no global singleton: the server binary loads settings once at
//! startup and passes the value down explicitly, and the client tracker is
//! constructed from a [`ClientSettings`] value.
//!
//! # Usage
//!
//! ```no_run
//! use pagepulse_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("listening on port {}", settings.server.port);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
