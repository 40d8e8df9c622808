//! Event repository — writes and aggregation reads for the `events` table.

use pagepulse_core::TrackedEvent;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::errors::Result;
use crate::row_types::{BucketCount, EventRow, TargetCount, UrlCount};

/// Time-series bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// `YYYY-MM-DDTHH:00` keys.
    Hourly,
    /// `YYYY-MM-DD` keys.
    Daily,
}

impl Bucket {
    fn strftime_format(self) -> &'static str {
        match self {
            Self::Hourly => "%Y-%m-%dT%H:00",
            Self::Daily => "%Y-%m-%d",
        }
    }
}

fn map_event_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    let raw_metadata: String = row.get(6)?;
    Ok(EventRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        event_type: row.get(2)?,
        url: row.get(3)?,
        referrer: row.get(4)?,
        timestamp: row.get(5)?,
        metadata: serde_json::from_str(&raw_metadata).unwrap_or_default(),
    })
}

const EVENT_COLUMNS: &str = "id, session_id, event_type, url, referrer, timestamp, metadata";

/// Event repository — stateless, every method takes `&Connection`.
pub struct EventRepo;

impl EventRepo {
    /// Insert one immutable event row. Caller owns the transaction.
    pub fn insert(conn: &Connection, event: &TrackedEvent) -> Result<String> {
        let id = format!("evt_{}", Uuid::now_v7());
        let metadata = serde_json::to_string(&event.metadata)
            .unwrap_or_else(|_| "{}".to_string());
        let _ = conn.execute(
            "INSERT INTO events (id, session_id, event_type, url, referrer, timestamp, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                event.session_id,
                event.event_type.as_str(),
                event.url,
                event.referrer,
                event.timestamp,
                metadata
            ],
        )?;
        Ok(id)
    }

    /// All events for a session, chronological.
    pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE session_id = ?1 ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id], map_event_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Click events for a session, chronological.
    pub fn clicks_for_session(conn: &Connection, session_id: &str) -> Result<Vec<EventRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE session_id = ?1 AND event_type = 'click'
             ORDER BY timestamp ASC, id ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id], map_event_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total event count.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Most-viewed page URLs (pageviews only), descending by frequency.
    pub fn top_pageview_urls(conn: &Connection, limit: usize) -> Result<Vec<UrlCount>> {
        let mut stmt = conn.prepare(
            "SELECT url, COUNT(*) AS count FROM events
             WHERE event_type = 'pageview'
             GROUP BY url ORDER BY count DESC, url ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(UrlCount {
                    url: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most-clicked targets, ranked by the `metadata.target` string.
    ///
    /// Clicks without a string `target` fall out of the ranking.
    pub fn top_click_targets(conn: &Connection, limit: usize) -> Result<Vec<TargetCount>> {
        let mut stmt = conn.prepare(
            "SELECT json_extract(metadata, '$.target') AS target, COUNT(*) AS count
             FROM events
             WHERE event_type = 'click' AND json_type(metadata, '$.target') = 'text'
             GROUP BY target ORDER BY count DESC, target ASC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(TargetCount {
                    target: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Click counts bucketed by hour or day, for timestamps at or after
    /// `since` (RFC3339, compared lexicographically — all stored stamps are
    /// UTC). Buckets with zero clicks are absent.
    pub fn click_series(conn: &Connection, since: &str, bucket: Bucket) -> Result<Vec<BucketCount>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT strftime('{}', timestamp) AS bucket, COUNT(*) AS count
             FROM events
             WHERE event_type = 'click' AND timestamp >= ?1
             GROUP BY bucket HAVING bucket IS NOT NULL
             ORDER BY bucket ASC",
            bucket.strftime_format()
        ))?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok(BucketCount {
                    bucket: row.get(0)?,
                    count: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
