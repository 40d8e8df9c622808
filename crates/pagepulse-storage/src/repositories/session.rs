//! Session repository — aggregate upserts and listing reads.
//!
//! The upsert is the ingestion hot path. It relies on SQLite's atomic
//! `INSERT ... ON CONFLICT DO UPDATE` so concurrent batches touching the
//! same session never lose updates; no application-level locking.

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::Result;
use crate::row_types::{SessionRow, SessionSummaryRow};

/// Inputs to a session upsert, one per ingested event.
pub struct UpsertSessionParams<'a> {
    /// Client-minted session id.
    pub session_id: &'a str,
    /// The event's timestamp — becomes `start_time` on first insert and
    /// `end_time` on every write.
    pub timestamp: &'a str,
    /// Whether the event was a pageview (increments `page_views`).
    pub is_pageview: bool,
    /// Request user agent; only recorded if the session has none yet.
    pub user_agent: Option<&'a str>,
}

fn map_session_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        session_id: row.get(0)?,
        start_time: row.get(1)?,
        end_time: row.get(2)?,
        page_views: row.get(3)?,
        user_agent: row.get(4)?,
    })
}

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert or update the aggregate for one event.
    ///
    /// On conflict: `end_time` advances to the incoming timestamp,
    /// `page_views` increments iff the event was a pageview, and
    /// `user_agent` keeps its first-written value.
    pub fn upsert(conn: &Connection, params: &UpsertSessionParams<'_>) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO sessions (session_id, start_time, end_time, page_views, user_agent)
             VALUES (?1, ?2, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                 end_time = excluded.end_time,
                 page_views = page_views + excluded.page_views,
                 user_agent = COALESCE(user_agent, excluded.user_agent)",
            params![
                params.session_id,
                params.timestamp,
                i64::from(params.is_pageview),
                params.user_agent
            ],
        )?;
        Ok(())
    }

    /// Fetch a session aggregate by id.
    pub fn get(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT session_id, start_time, end_time, page_views, user_agent
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                map_session_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Latest sessions (by `start_time`) with computed duration and click
    /// totals, capped at `limit`.
    pub fn list_recent(conn: &Connection, limit: usize) -> Result<Vec<SessionSummaryRow>> {
        let mut stmt = conn.prepare(
            "SELECT s.session_id, s.start_time, s.end_time, s.page_views, s.user_agent,
                    CASE WHEN s.end_time IS NULL THEN 0.0
                         ELSE (julianday(s.end_time) - julianday(s.start_time)) * 86400.0
                    END AS duration,
                    (SELECT COUNT(*) FROM events e
                     WHERE e.session_id = s.session_id AND e.event_type = 'click') AS total_clicks
             FROM sessions s
             ORDER BY s.start_time DESC, s.session_id DESC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(SessionSummaryRow {
                    session: map_session_row(row)?,
                    duration: row.get(5)?,
                    total_clicks: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Total session count.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Mean duration in seconds over sessions where `end_time > start_time`;
    /// 0.0 when none qualify.
    pub fn avg_duration_seconds(conn: &Connection) -> Result<f64> {
        let avg: f64 = conn.query_row(
            "SELECT COALESCE(AVG((julianday(end_time) - julianday(start_time)) * 86400.0), 0.0)
             FROM sessions WHERE end_time IS NOT NULL AND end_time > start_time",
            [],
            |row| row.get(0),
        )?;
        Ok(avg)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
