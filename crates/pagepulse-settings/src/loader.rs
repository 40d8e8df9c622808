//! Settings loading: defaults → JSON file → env overrides.
//!
//! The file layer is deep-merged over the compiled defaults so a partial
//! `pagepulse.json` only overrides the keys it names. Env overrides are
//! applied last and win over everything.

use std::env;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::PagepulseSettings;

/// Default settings file path: `$PAGEPULSE_CONFIG` or `./pagepulse.json`.
pub fn settings_path() -> PathBuf {
    env::var("PAGEPULSE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("pagepulse.json"))
}

/// Load settings from the default path with env overrides applied.
///
/// A missing file is not an error — defaults are used. A file that exists
/// but fails to parse is an error, surfaced to the caller.
pub fn load_settings() -> Result<PagepulseSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env overrides applied.
pub fn load_settings_from_path(path: &Path) -> Result<PagepulseSettings> {
    let defaults = serde_json::to_value(PagepulseSettings::default())?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path)?;
        let file_value: Value = serde_json::from_str(&raw)?;
        debug!(?path, "merging settings file over defaults");
        deep_merge(defaults, file_value)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: PagepulseSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings)?;
    Ok(settings)
}

/// Deep-merge `overlay` into `base`.
///
/// Objects merge recursively; any other value in `overlay` replaces the
/// corresponding `base` value wholesale.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `PAGEPULSE_*` env overrides (highest priority layer).
fn apply_env_overrides(settings: &mut PagepulseSettings) -> Result<()> {
    if let Ok(bind) = env::var("PAGEPULSE_BIND") {
        settings.server.bind = bind;
    }
    if let Ok(port) = env::var("PAGEPULSE_PORT") {
        settings.server.port = parse_env("PAGEPULSE_PORT", &port)?;
    }
    if let Ok(db_path) = env::var("PAGEPULSE_DB_PATH") {
        settings.server.db_path = db_path;
    }
    if let Ok(endpoint) = env::var("PAGEPULSE_ENDPOINT") {
        settings.client.endpoint = endpoint;
    }
    if let Ok(dir) = env::var("PAGEPULSE_STATE_DIR") {
        settings.client.state_dir = Some(dir);
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| SettingsError::InvalidEnvOverride {
            var: var.to_string(),
            value: value.to_string(),
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
