//! Row structs — the storage-side shapes returned by repositories.
//!
//! Serialized directly into API responses, so field names are part of the
//! wire contract.

use serde::Serialize;
use serde_json::Value;

/// A persisted event row.
#[derive(Debug, Clone, Serialize)]
pub struct EventRow {
    /// Row id (`evt_` prefixed UUIDv7).
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Event kind string (`pageview` | `click` | `custom`).
    pub event_type: String,
    /// Page URL.
    pub url: String,
    /// Referring page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    /// RFC3339 event time, stored verbatim from the client.
    pub timestamp: String,
    /// Free-form payload.
    pub metadata: Value,
}

/// A session aggregate row.
#[derive(Debug, Clone, Serialize)]
pub struct SessionRow {
    /// Client-minted session id.
    pub session_id: String,
    /// First observed event time.
    pub start_time: String,
    /// Latest observed event time.
    pub end_time: Option<String>,
    /// Count of ingested pageview events.
    pub page_views: i64,
    /// First user agent seen for this session (first-write-wins).
    pub user_agent: Option<String>,
}

/// A session row extended with computed listing fields.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummaryRow {
    /// The aggregate row.
    #[serde(flatten)]
    pub session: SessionRow,
    /// `end_time - start_time` in seconds; 0 when `end_time` is absent.
    pub duration: f64,
    /// Click events ingested for this session.
    pub total_clicks: i64,
}

/// A (url, count) pair for page rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlCount {
    /// Page URL.
    pub url: String,
    /// Pageview occurrences.
    pub count: i64,
}

/// A (target, count) pair for click-target rankings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetCount {
    /// `metadata.target` value.
    pub target: String,
    /// Click occurrences.
    pub count: i64,
}

/// One bucket of a click time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    /// Bucket key (`YYYY-MM-DDTHH:00` for hourly, `YYYY-MM-DD` for daily).
    pub bucket: String,
    /// Click events in the bucket.
    pub count: i64,
}

/// Per-URL rollup inside a session detail view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageVisit {
    /// Page URL.
    pub url: String,
    /// Timestamp of the first pageview for this URL.
    pub first_visit: String,
    /// Number of pageviews for this URL.
    pub view_count: i64,
    /// Seconds spent on this URL, summed across visits.
    pub time_on_page: f64,
}
