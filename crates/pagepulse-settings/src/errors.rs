//! Settings load/parse errors.

use thiserror::Error;

/// Errors surfaced while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but couldn't be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// The settings file isn't valid JSON, or doesn't match the schema.
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    /// An env override held a value that can't be parsed for its field.
    #[error("invalid value for {var}: {value}")]
    InvalidEnvOverride {
        /// Environment variable name.
        var: String,
        /// The offending value.
        value: String,
    },
}

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
