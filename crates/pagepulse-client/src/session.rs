//! Session lifecycle — stable ids with inactivity-based expiry.
//!
//! A session id is reused across tracker restarts while the stored record's
//! `lastActivityAt` is within the timeout window (30 minutes by default);
//! otherwise a fresh id is minted. When durable storage is unavailable the
//! manager runs on in-memory state only — analytics degrade to
//! per-process sessions, never to an error.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pagepulse_core::time;

use crate::state_store::{SESSION_KEY, StateStore};

const SESSION_ID_RANDOM_CHARS: usize = 9;

/// Persisted client session state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// The minted session id.
    pub session_id: String,
    /// Epoch millis at mint time.
    pub created_at: i64,
    /// Epoch millis of the most recent activity.
    pub last_activity_at: i64,
}

/// Derives and persists the current session id.
pub struct SessionManager {
    store: Arc<dyn StateStore>,
    timeout_ms: i64,
    current: Mutex<Option<SessionRecord>>,
}

impl SessionManager {
    /// Manager backed by `store`, expiring sessions after `timeout_ms` of
    /// inactivity.
    pub fn new(store: Arc<dyn StateStore>, timeout_ms: i64) -> Self {
        Self {
            store,
            timeout_ms,
            current: Mutex::new(None),
        }
    }

    /// Current session id, minting a new one if none is live.
    ///
    /// Reuses the persisted record while `now - lastActivityAt` is inside
    /// the timeout window, refreshing its activity stamp. Never fails —
    /// storage problems fall back to in-memory state.
    pub fn get_or_create_session_id(&self) -> String {
        let mut current = self.current.lock();
        let now = time::now_millis();

        if current.is_none() {
            *current = self.load_persisted();
        }

        match current.as_mut() {
            Some(record) if now - record.last_activity_at < self.timeout_ms => {
                record.last_activity_at = now;
                self.persist(record);
                record.session_id.clone()
            }
            _ => {
                let record = SessionRecord {
                    session_id: mint_session_id(now),
                    created_at: now,
                    last_activity_at: now,
                };
                debug!(session_id = %record.session_id, "minted new session");
                self.persist(&record);
                let id = record.session_id.clone();
                *current = Some(record);
                id
            }
        }
    }

    /// Extend the live session's activity window.
    ///
    /// Called on every tracked event and on a fixed interval so a session
    /// stays alive while the application remains open.
    pub fn touch(&self) {
        let mut current = self.current.lock();
        if let Some(record) = current.as_mut() {
            record.last_activity_at = time::now_millis();
            self.persist(record);
        }
    }

    fn load_persisted(&self) -> Option<SessionRecord> {
        let raw = self.store.get(SESSION_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(err) => {
                debug!(error = %err, "discarding unparseable session record");
                None
            }
        }
    }

    fn persist(&self, record: &SessionRecord) {
        if let Ok(raw) = serde_json::to_string(record) {
            // Best-effort: a false return means storage is unavailable and
            // the in-memory record carries on alone.
            let _ = self.store.set(SESSION_KEY, &raw);
        }
    }
}

/// Mint a session id: `sess_` + 9 random base36 chars + base36 epoch millis.
fn mint_session_id(now_ms: i64) -> String {
    let mut rng = rand::rng();
    let random: String = (0..SESSION_ID_RANDOM_CHARS)
        .map(|_| char::from_digit(rng.random_range(0..36), 36).unwrap_or('0'))
        .collect();
    format!("sess_{random}{}", to_base36(now_ms.max(0) as u64))
}

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(char::from_digit((n % 36) as u32, 36).unwrap_or('0'));
        n /= 36;
    }
    digits.iter().rev().collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::MemoryStateStore;

    const THIRTY_MINUTES_MS: i64 = 30 * 60 * 1000;

    /// A store that is permanently unavailable.
    struct UnavailableStore;

    impl StateStore for UnavailableStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }
        fn set(&self, _key: &str, _value: &str) -> bool {
            false
        }
        fn remove(&self, _key: &str) -> bool {
            false
        }
    }

    fn manager_with(store: Arc<dyn StateStore>) -> SessionManager {
        SessionManager::new(store, THIRTY_MINUTES_MS)
    }

    fn seed_record(store: &dyn StateStore, session_id: &str, last_activity_at: i64) {
        let record = SessionRecord {
            session_id: session_id.to_string(),
            created_at: last_activity_at,
            last_activity_at,
        };
        assert!(store.set(SESSION_KEY, &serde_json::to_string(&record).unwrap()));
    }

    #[test]
    fn mints_id_with_expected_shape() {
        let id = mint_session_id(time::now_millis());
        assert!(id.starts_with("sess_"));
        let rest = &id["sess_".len()..];
        assert!(rest.len() > SESSION_ID_RANDOM_CHARS);
        assert!(rest.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(36 * 36 + 1), "101");
    }

    #[test]
    fn repeated_calls_reuse_the_live_session() {
        let manager = manager_with(Arc::new(MemoryStateStore::new()));
        let first = manager.get_or_create_session_id();
        let second = manager.get_or_create_session_id();
        assert_eq!(first, second);
    }

    #[test]
    fn fresh_persisted_record_is_reused_and_extended() {
        let store = Arc::new(MemoryStateStore::new());
        let minute_ago = time::now_millis() - 60_000;
        seed_record(store.as_ref(), "sess_live", minute_ago);

        let manager = manager_with(Arc::clone(&store) as Arc<dyn StateStore>);
        assert_eq!(manager.get_or_create_session_id(), "sess_live");

        // The activity stamp was refreshed in storage
        let raw = store.get(SESSION_KEY).unwrap();
        let record: SessionRecord = serde_json::from_str(&raw).unwrap();
        assert!(record.last_activity_at > minute_ago);
    }

    #[test]
    fn stale_persisted_record_mints_a_new_id() {
        let store = Arc::new(MemoryStateStore::new());
        let stale = time::now_millis() - THIRTY_MINUTES_MS - 1_000;
        seed_record(store.as_ref(), "sess_stale", stale);

        let manager = manager_with(Arc::clone(&store) as Arc<dyn StateStore>);
        let id = manager.get_or_create_session_id();
        assert_ne!(id, "sess_stale");
        assert!(id.starts_with("sess_"));
    }

    #[test]
    fn touch_extends_an_expiring_session() {
        let store = Arc::new(MemoryStateStore::new());
        let manager = manager_with(Arc::clone(&store) as Arc<dyn StateStore>);
        let id = manager.get_or_create_session_id();

        // Backdate the live record almost to the edge of the window,
        // then touch — the session must survive.
        {
            let mut current = manager.current.lock();
            current.as_mut().unwrap().last_activity_at =
                time::now_millis() - THIRTY_MINUTES_MS + 5_000;
        }
        manager.touch();
        assert_eq!(manager.get_or_create_session_id(), id);
    }

    #[test]
    fn corrupted_record_is_discarded() {
        let store = Arc::new(MemoryStateStore::new());
        assert!(store.set(SESSION_KEY, "{not json"));

        let manager = manager_with(Arc::clone(&store) as Arc<dyn StateStore>);
        let id = manager.get_or_create_session_id();
        assert!(id.starts_with("sess_"));
    }

    #[test]
    fn unavailable_storage_falls_back_to_memory() {
        let manager = manager_with(Arc::new(UnavailableStore));
        let first = manager.get_or_create_session_id();
        let second = manager.get_or_create_session_id();
        // Stable within the process despite storage being down
        assert_eq!(first, second);
    }

    #[test]
    fn touch_without_session_is_a_no_op() {
        let store = Arc::new(MemoryStateStore::new());
        let manager = manager_with(Arc::clone(&store) as Arc<dyn StateStore>);
        manager.touch();
        assert!(store.get(SESSION_KEY).is_none());
    }
}
