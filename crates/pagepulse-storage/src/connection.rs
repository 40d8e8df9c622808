//! Connection pool — r2d2 over `rusqlite` with per-connection pragmas.
//!
//! WAL journaling lets concurrent batch ingests and dashboard reads proceed
//! without blocking each other; `busy_timeout` bounds writer contention.

use std::path::Path;
use std::time::Duration;

use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::errors::Result;
use crate::migrations::run_migrations;

/// Pooled SQLite connections.
pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;

/// A checked-out connection.
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT_MS: u64 = 5_000;

fn configure(conn: &mut rusqlite::Connection) -> std::result::Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Open (or create) a database file and build a pool with migrations applied.
pub fn open_pool(path: &Path, max_size: u32) -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::file(path).with_init(configure);
    let pool = r2d2::Pool::builder().max_size(max_size).build(manager)?;

    let conn = pool.get()?;
    run_migrations(&conn)?;
    info!(path = %path.display(), max_size, "database pool ready");
    Ok(pool)
}

/// In-memory pool for tests.
///
/// Capped at one connection — each rusqlite in-memory connection is its own
/// database, so a larger pool would hand out empty databases.
pub fn memory_pool() -> Result<ConnectionPool> {
    let manager = SqliteConnectionManager::memory().with_init(configure);
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    run_migrations(&*pool.get()?)?;
    Ok(pool)
}
