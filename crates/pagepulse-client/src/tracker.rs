//! Top-level tracker — an explicitly constructed, owned instance.
//!
//! Wires the session manager and event buffer together with two timers: a
//! periodic flush (default 2 s) and a session keep-alive touch (default
//! 60 s). There is no global registration; the embedding application owns
//! the `Tracker` and calls [`Tracker::destroy`] at teardown for the final
//! flush.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::info;

use pagepulse_core::{EventType, PageContext, TrackedEvent};
use pagepulse_settings::ClientSettings;

use crate::buffer::{EventBuffer, FlushMode};
use crate::session::SessionManager;
use crate::state_store::{FileStateStore, MemoryStateStore, StateStore};

/// Owned tracker instance.
///
/// Must be constructed inside a tokio runtime — construction recovers
/// spilled events and spawns the flush/touch timers. Tracking after
/// [`Tracker::destroy`] is not supported.
pub struct Tracker {
    session: Arc<SessionManager>,
    buffer: EventBuffer,
    tasks: Vec<JoinHandle<()>>,
}

impl Tracker {
    /// Build a tracker from settings and start its timers.
    ///
    /// With a configured `state_dir` the session record and failed-event
    /// spill survive restarts; without one, state is in-memory only.
    pub fn new(settings: ClientSettings) -> Self {
        let store: Arc<dyn StateStore> = match &settings.state_dir {
            Some(dir) => Arc::new(FileStateStore::new(dir)),
            None => Arc::new(MemoryStateStore::new()),
        };

        let session = Arc::new(SessionManager::new(
            Arc::clone(&store),
            settings.session_timeout_ms,
        ));
        let buffer = EventBuffer::new(settings.clone(), store);
        buffer.recover_failed_events();

        let mut tasks = Vec::new();

        // Periodic flush
        {
            let buffer = buffer.clone();
            let period = Duration::from_millis(settings.batch_interval_ms);
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await; // first tick fires immediately
                loop {
                    interval.tick().await;
                    buffer.flush(FlushMode::Scheduled).await;
                }
            }));
        }

        // Session keep-alive while the application stays open without
        // further tracked interactions
        {
            let session = Arc::clone(&session);
            let period = Duration::from_millis(settings.touch_interval_ms);
            tasks.push(tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    session.touch();
                }
            }));
        }

        Self {
            session,
            buffer,
            tasks,
        }
    }

    /// Current session id. Refreshes the session's activity window, minting
    /// a new id if the previous one expired.
    pub fn session_id(&self) -> String {
        self.session.get_or_create_session_id()
    }

    /// Track a pageview.
    pub fn track_pageview(&self, page: &PageContext) {
        self.track(EventType::Pageview, page, BTreeMap::new());
    }

    /// Track a click. A string `target` metadata entry feeds the
    /// top-click-target ranking.
    pub fn track_click(&self, page: &PageContext, metadata: BTreeMap<String, Value>) {
        self.track(EventType::Click, page, metadata);
    }

    /// Track an application-defined event.
    pub fn track_custom(&self, page: &PageContext, metadata: BTreeMap<String, Value>) {
        self.track(EventType::Custom, page, metadata);
    }

    /// Queue an event for delivery. Never blocks.
    pub fn track(&self, event_type: EventType, page: &PageContext, metadata: BTreeMap<String, Value>) {
        // get_or_create refreshes the activity window, doubling as the
        // per-event touch.
        let session_id = self.session.get_or_create_session_id();
        self.buffer
            .track(TrackedEvent::now(session_id, event_type, page, metadata));
    }

    /// Flush queued events now instead of waiting for the timer.
    pub async fn flush_now(&self) {
        self.buffer.flush(FlushMode::Scheduled).await;
    }

    /// Events waiting in the queue.
    pub fn pending(&self) -> usize {
        self.buffer.pending()
    }

    /// Tear the tracker down: stop the timers and run one final flush.
    ///
    /// The final flush makes a single attempt; on failure the batch spills
    /// to the fallback store for recovery by the next instance.
    pub async fn destroy(self) {
        for task in &self.tasks {
            task.abort();
        }
        self.buffer.flush(FlushMode::Final).await;
        info!("tracker destroyed");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
