//! Event types — the shared wire and storage representation.
//!
//! A [`TrackedEvent`] is immutable once created: the client queues it, the
//! server persists it, and nothing mutates it in between. Field names match
//! the JSON wire format (snake_case).

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CoreError;
use crate::time;

/// Kind of tracked interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A page was loaded or navigated to.
    Pageview,
    /// An element was clicked.
    Click,
    /// Application-defined event.
    Custom,
}

impl EventType {
    /// Storage/wire string for this variant.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pageview => "pageview",
            Self::Click => "click",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for EventType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pageview" => Ok(Self::Pageview),
            "click" => Ok(Self::Click),
            "custom" => Ok(Self::Custom),
            other => Err(CoreError::UnknownEventType(other.to_string())),
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// URL/referrer pair for the page an event occurred on.
///
/// Supplied by the embedding application — the tracker library has no
/// ambient notion of a "current page".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    /// Current page URL.
    pub url: String,
    /// Referring page, if any.
    pub referrer: Option<String>,
}

impl PageContext {
    /// Page context with a URL and no referrer.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referrer: None,
        }
    }

    /// Set the referrer.
    #[must_use]
    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }
}

/// A single analytics event.
///
/// Immutable once queued. `timestamp` is an RFC3339 string — stored and
/// transmitted verbatim so ordering comparisons are lexicographic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    /// Session this event belongs to.
    pub session_id: String,
    /// Interaction kind.
    pub event_type: EventType,
    /// Page URL at the time of the event.
    pub url: String,
    /// Referring page, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    /// RFC3339 creation time.
    pub timestamp: String,
    /// Free-form event payload.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl TrackedEvent {
    /// Build an event stamped with the current time.
    pub fn now(
        session_id: impl Into<String>,
        event_type: EventType,
        page: &PageContext,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            event_type,
            url: page.url.clone(),
            referrer: page.referrer.clone(),
            timestamp: time::now_rfc3339(),
            metadata,
        }
    }

    /// Validate the fields the ingestion service requires.
    ///
    /// `session_id` and `url` must be non-empty; `event_type` is enforced by
    /// the type system here but checked again server-side on raw JSON.
    pub fn validate(&self) -> crate::Result<()> {
        if self.session_id.is_empty() {
            return Err(CoreError::MissingField("session_id"));
        }
        if self.url.is_empty() {
            return Err(CoreError::MissingField("url"));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
