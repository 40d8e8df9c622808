//! Versioned schema migrations, tracked via `PRAGMA user_version`.
//!
//! Each migration runs at most once, in order, inside its own transaction.

use rusqlite::Connection;
use tracing::info;

use crate::errors::Result;

const MIGRATIONS: &[&str] = &[
    // v1: events + session aggregates
    "CREATE TABLE events (
         id TEXT PRIMARY KEY,
         session_id TEXT NOT NULL,
         event_type TEXT NOT NULL,
         url TEXT NOT NULL,
         referrer TEXT,
         timestamp TEXT NOT NULL,
         metadata TEXT NOT NULL DEFAULT '{}'
     );
     CREATE INDEX idx_events_session_time ON events(session_id, timestamp);
     CREATE INDEX idx_events_type_time ON events(event_type, timestamp);
     CREATE TABLE sessions (
         session_id TEXT PRIMARY KEY,
         start_time TEXT NOT NULL,
         end_time TEXT,
         page_views INTEGER NOT NULL DEFAULT 0,
         user_agent TEXT
     );
     CREATE INDEX idx_sessions_start ON sessions(start_time DESC);",
];

/// Apply any migrations newer than the database's `user_version`.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let version = (idx + 1) as i64;
        if version <= current {
            continue;
        }
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        // PRAGMA doesn't support parameter binding
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
        info!(version, "applied migration");
    }
    Ok(())
}
