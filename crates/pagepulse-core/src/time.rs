//! Time helpers — RFC3339 strings and epoch milliseconds.
//!
//! Timestamps live as RFC3339 strings throughout (rows, wire, client queue)
//! so they sort lexicographically. Epoch millis are used only for the
//! client's session-activity arithmetic.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an RFC3339 string.
///
/// Millisecond precision with a `Z` suffix — a form SQLite's datetime
/// functions parse, so stored timestamps work in bucketing SQL.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Parse an RFC3339 timestamp, normalizing to UTC.
pub fn parse_rfc3339(s: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| crate::CoreError::InvalidTimestamp(s.to_string()))
}
