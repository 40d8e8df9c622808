//! Best-effort durable key/value storage for client state.
//!
//! The tracker degrades gracefully when durable storage is unavailable:
//! every operation is infallible at the call site — a failed read is
//! `None`, a failed write returns `false` and is otherwise silent (logged
//! at debug, never surfaced). Callers branch on absence explicitly.

use std::collections::HashMap;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::debug;

/// Key for the persisted session record.
pub const SESSION_KEY: &str = "session";
/// Key for the spilled failed-events list.
pub const FAILED_EVENTS_KEY: &str = "failed_events";

/// Best-effort key/value storage.
///
/// Implementations must never panic; unavailability is expressed through
/// return values.
pub trait StateStore: Send + Sync {
    /// Read a value. `None` when absent or the store is unavailable.
    fn get(&self, key: &str) -> Option<String>;
    /// Write a value. `false` when the store is unavailable.
    fn set(&self, key: &str, value: &str) -> bool;
    /// Remove a value. `false` when absent or the store is unavailable.
    fn remove(&self, key: &str) -> bool;
}

/// Durable store: one file per key under a state directory.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Store rooted at `dir`. The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStore for FileStateStore {
    fn get(&self, key: &str) -> Option<String> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(value) => Some(value),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    debug!(key, error = %err, "state read failed");
                }
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> bool {
        if let Err(err) = std::fs::create_dir_all(&self.dir) {
            debug!(key, error = %err, "state dir unavailable");
            return false;
        }
        match std::fs::write(self.path_for(key), value) {
            Ok(()) => true,
            Err(err) => {
                debug!(key, error = %err, "state write failed");
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        std::fs::remove_file(self.path_for(key)).is_ok()
    }
}

/// In-memory store — the fallback when no state directory is configured,
/// and the workhorse for tests.
#[derive(Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStateStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        let _ = self.values.lock().insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) -> bool {
        self.values.lock().remove(key).is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        assert!(store.get(SESSION_KEY).is_none());
        assert!(store.set(SESSION_KEY, "{\"sessionId\":\"sess_x\"}"));
        assert_eq!(
            store.get(SESSION_KEY).as_deref(),
            Some("{\"sessionId\":\"sess_x\"}")
        );
        assert!(store.remove(SESSION_KEY));
        assert!(store.get(SESSION_KEY).is_none());
    }

    #[test]
    fn file_store_creates_dir_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested/state"));
        assert!(store.set("k", "v"));
        assert_eq!(store.get("k").as_deref(), Some("v"));
    }

    #[test]
    fn file_store_unwritable_dir_fails_silently() {
        // A file where the directory should be makes create_dir_all fail.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "").unwrap();

        let store = FileStateStore::new(&blocker);
        assert!(!store.set("k", "v"));
        assert!(store.get("k").is_none());
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStateStore::new();
        assert!(store.set("k", "v"));
        assert_eq!(store.get("k").as_deref(), Some("v"));
        assert!(store.remove("k"));
        assert!(!store.remove("k"));
    }
}
