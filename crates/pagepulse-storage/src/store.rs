//! High-level transactional `AnalyticsStore` API.
//!
//! Composes the repositories into the operations the server exposes. Batch
//! ingest runs inside a single transaction — callers never observe a
//! partially committed batch. Reads are independent and lock-free.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use pagepulse_core::{EventType, TrackedEvent, time};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::connection::{self, ConnectionPool, PooledConnection};
use crate::errors::{Result, StoreError};
use crate::repositories::event::{Bucket, EventRepo};
use crate::repositories::session::{SessionRepo, UpsertSessionParams};
use crate::row_types::{BucketCount, EventRow, PageVisit, SessionRow, SessionSummaryRow};

/// Maximum events accepted in one ingest batch.
pub const MAX_BATCH_SIZE: usize = 100;
/// Sessions returned by the listing endpoint.
const SESSION_LIST_LIMIT: usize = 50;
/// Entries in top-URL / top-target rankings.
const TOP_LIMIT: usize = 5;

// Metric name constants to avoid typos. The server layer keeps its own
// request-level names alongside these.

/// Committed batches (counter).
pub const INGEST_BATCHES_TOTAL: &str = "ingest_batches_total";
/// Events written across all batches (counter).
pub const INGEST_EVENTS_TOTAL: &str = "ingest_events_total";
/// Batch transaction duration (histogram).
pub const INGEST_BATCH_DURATION_SECONDS: &str = "ingest_batch_duration_seconds";

/// Aggregated dashboard statistics.
#[derive(Debug, Serialize)]
pub struct StatsSummary {
    /// Total session count.
    pub total_sessions: i64,
    /// Total event count.
    pub total_events: i64,
    /// Top click targets by `metadata.target`.
    pub top_click_targets: Vec<crate::row_types::TargetCount>,
    /// Top pageview URLs by frequency.
    pub top_pages: Vec<crate::row_types::UrlCount>,
    /// Mean session duration in seconds (0.0 when no session qualifies).
    pub avg_session_duration: f64,
}

/// Full detail view for one session.
#[derive(Debug, Serialize)]
pub struct SessionDetail {
    /// The session aggregate.
    #[serde(flatten)]
    pub session: SessionRow,
    /// All events, chronological.
    pub events: Vec<EventRow>,
    /// Per-URL pageview rollups.
    pub pages: Vec<PageVisit>,
    /// Click events, chronological.
    pub clicks: Vec<EventRow>,
}

/// Click time-series window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Hourly buckets over the trailing 24 hours.
    Day,
    /// Daily buckets over the trailing 7 days.
    Week,
}

impl FromStr for TimeWindow {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            other => Err(StoreError::Validation(format!(
                "unknown window '{other}' (expected 'day' or 'week')"
            ))),
        }
    }
}

/// Transactional ingest + read-only aggregation over a connection pool.
pub struct AnalyticsStore {
    pool: ConnectionPool,
    slow_query_ms: u64,
}

impl AnalyticsStore {
    const BUSY_MAX_RETRIES: u32 = 16;

    /// Wrap an existing pool.
    pub fn new(pool: ConnectionPool, slow_query_ms: u64) -> Self {
        Self {
            pool,
            slow_query_ms,
        }
    }

    /// Open (or create) a database file with migrations applied.
    pub fn open(path: &Path, pool_size: u32, slow_query_ms: u64) -> Result<Self> {
        Ok(Self::new(connection::open_pool(path, pool_size)?, slow_query_ms))
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(connection::memory_pool()?, u64::MAX))
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Run a read query, logging (not aborting) when it exceeds the
    /// slow-query threshold.
    fn timed<T>(&self, name: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let started = Instant::now();
        let result = f();
        let elapsed = started.elapsed();
        if elapsed.as_millis() as u64 > self.slow_query_ms {
            warn!(query = name, elapsed_ms = elapsed.as_millis() as u64, "slow query");
        }
        result
    }

    /// Retry an operation on `SQLite` BUSY/LOCKED with linear backoff.
    fn retry_on_sqlite_busy<T>(&self, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;
        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err) if Self::is_busy_or_locked(&err) && attempts < Self::BUSY_MAX_RETRIES => {
                    attempts += 1;
                    let backoff_ms = u64::from(attempts).saturating_mul(10).min(500);
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_busy_or_locked(err: &StoreError) -> bool {
        match err {
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ingest
    // ─────────────────────────────────────────────────────────────────────

    /// Ingest a batch of raw event objects as one atomic transaction.
    ///
    /// The first invalid event aborts the whole batch with a validation
    /// error and nothing is committed. On success returns the number of
    /// events written.
    ///
    /// `page_views` increments per pageview event with no batch dedup: a
    /// batch that committed server-side but timed out client-side will
    /// double-count when the client retries it.
    #[instrument(skip(self, batch), fields(batch_len = batch.len()))]
    pub fn ingest_batch(&self, batch: &[Value], user_agent: Option<&str>) -> Result<usize> {
        if batch.is_empty() {
            return Err(StoreError::Validation("empty batch".to_string()));
        }
        if batch.len() > MAX_BATCH_SIZE {
            return Err(StoreError::Validation(format!(
                "batch of {} exceeds maximum of {MAX_BATCH_SIZE}",
                batch.len()
            )));
        }

        // Parse and validate before touching the database so a doomed batch
        // never opens a transaction.
        let events = batch
            .iter()
            .enumerate()
            .map(|(index, value)| parse_event(index, value))
            .collect::<Result<Vec<_>>>()?;

        let started = Instant::now();
        let count = self.retry_on_sqlite_busy(|| {
            let conn = self.conn()?;
            let tx = conn.unchecked_transaction()?;
            for event in &events {
                let _ = EventRepo::insert(&tx, event)?;
                SessionRepo::upsert(
                    &tx,
                    &UpsertSessionParams {
                        session_id: &event.session_id,
                        timestamp: &event.timestamp,
                        is_pageview: event.event_type == EventType::Pageview,
                        user_agent,
                    },
                )?;
            }
            tx.commit()?;
            Ok(events.len())
        })?;

        metrics::counter!(INGEST_BATCHES_TOTAL).increment(1);
        metrics::counter!(INGEST_EVENTS_TOTAL).increment(count as u64);
        metrics::histogram!(INGEST_BATCH_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(count, "batch committed");
        Ok(count)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────

    /// Dashboard summary statistics. Empty storage yields zeroed values.
    pub fn stats(&self) -> Result<StatsSummary> {
        self.timed("stats", || {
            let conn = self.conn()?;
            Ok(StatsSummary {
                total_sessions: SessionRepo::count(&conn)?,
                total_events: EventRepo::count(&conn)?,
                top_click_targets: EventRepo::top_click_targets(&conn, TOP_LIMIT)?,
                top_pages: EventRepo::top_pageview_urls(&conn, TOP_LIMIT)?,
                avg_session_duration: SessionRepo::avg_duration_seconds(&conn)?,
            })
        })
    }

    /// Click time series for the given window.
    pub fn click_timeseries(&self, window: TimeWindow) -> Result<Vec<BucketCount>> {
        let (since, bucket) = match window {
            TimeWindow::Day => (Utc::now() - chrono::Duration::days(1), Bucket::Hourly),
            TimeWindow::Week => (Utc::now() - chrono::Duration::days(7), Bucket::Daily),
        };
        let since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        self.timed("click_timeseries", || {
            EventRepo::click_series(&*self.conn()?, &since, bucket)
        })
    }

    /// Latest sessions with computed duration and click totals.
    pub fn recent_sessions(&self) -> Result<Vec<SessionSummaryRow>> {
        self.timed("recent_sessions", || {
            SessionRepo::list_recent(&*self.conn()?, SESSION_LIST_LIMIT)
        })
    }

    /// Full detail for one session, or `SessionNotFound`.
    pub fn session_detail(&self, session_id: &str) -> Result<SessionDetail> {
        self.timed("session_detail", || {
            let conn = self.conn()?;
            let session = SessionRepo::get(&conn, session_id)?
                .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
            let events = EventRepo::list_for_session(&conn, session_id)?;
            let clicks = EventRepo::clicks_for_session(&conn, session_id)?;
            let pages = page_visits(&events);
            Ok(SessionDetail {
                session,
                events,
                pages,
                clicks,
            })
        })
    }

    /// Storage connectivity probe for `/health/db`.
    pub fn ping(&self) -> Result<()> {
        let one: i64 = self.conn()?.query_row("SELECT 1", [], |row| row.get(0))?;
        if one == 1 {
            Ok(())
        } else {
            Err(StoreError::Internal("SELECT 1 returned garbage".to_string()))
        }
    }
}

/// Parse and validate one raw batch entry.
///
/// Presence of `session_id`, `event_type`, and `url` is required; an
/// unknown `event_type` string is rejected by deserialization.
fn parse_event(index: usize, value: &Value) -> Result<TrackedEvent> {
    if !value.is_object() {
        return Err(StoreError::invalid_event(index, "not an object"));
    }
    let event: TrackedEvent = serde_json::from_value(value.clone())
        .map_err(|err| StoreError::invalid_event(index, err))?;
    event
        .validate()
        .map_err(|err| StoreError::invalid_event(index, err))?;
    Ok(event)
}

/// Per-URL pageview rollups from a session's chronological events.
///
/// Time on page is the gap between consecutive pageviews, attributed to the
/// earlier page; the session's final pageview contributes no time.
fn page_visits(events: &[EventRow]) -> Vec<PageVisit> {
    let pageviews: Vec<&EventRow> = events
        .iter()
        .filter(|e| e.event_type == EventType::Pageview.as_str())
        .collect();

    let mut visits: BTreeMap<&str, PageVisit> = BTreeMap::new();
    for (i, view) in pageviews.iter().enumerate() {
        let entry = visits.entry(&view.url).or_insert_with(|| PageVisit {
            url: view.url.clone(),
            first_visit: view.timestamp.clone(),
            view_count: 0,
            time_on_page: 0.0,
        });
        entry.view_count += 1;

        if let Some(next) = pageviews.get(i + 1) {
            if let (Ok(current), Ok(following)) = (
                time::parse_rfc3339(&view.timestamp),
                time::parse_rfc3339(&next.timestamp),
            ) {
                let gap = (following - current).num_milliseconds() as f64 / 1000.0;
                if gap > 0.0 {
                    entry.time_on_page += gap;
                }
            }
        }
    }

    let mut out: Vec<PageVisit> = visits.into_values().collect();
    out.sort_by(|a, b| a.first_visit.cmp(&b.first_visit));
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
