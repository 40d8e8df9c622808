//! Event buffer and delivery engine.
//!
//! An [`EventBuffer`] owns a bounded FIFO queue of not-yet-sent events and
//! delivers them in batches over HTTP. Delivery guarantees:
//!
//! - **Single-flight**: at most one flush in progress per buffer; a flush
//!   atomically drains the queue into a snapshot, so events tracked during
//!   an in-flight POST land in a fresh queue and are never lost.
//! - **Back-pressure**: tracking past the queue cap forces an immediate
//!   flush of the existing contents before the new event is appended.
//! - **Retry with linear backoff**: a transient failure pushes the snapshot
//!   back to the FRONT of the queue (ahead of anything tracked meanwhile)
//!   and schedules a retry after `retry_delay × attempt`.
//! - **Durable spill**: a terminal failure (4xx, final-mode flush, or
//!   retries exhausted) writes the snapshot to the fallback store, capped
//!   at the most recent `failed_event_cap` events, for recovery on the next
//!   start. Loss beyond the cap is accepted.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use pagepulse_core::TrackedEvent;
use pagepulse_settings::ClientSettings;

use crate::errors::{ClientError, Result};
use crate::state_store::{FAILED_EVENTS_KEY, StateStore};

/// Delay before the post-recovery flush, letting initialization finish.
const RECOVERY_FLUSH_DELAY_MS: u64 = 1_000;

/// How a flush was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Timer-driven or forced flush; transient failures schedule retries.
    Scheduled,
    /// Teardown flush (the runtime is about to go away): one attempt, any
    /// failure spills straight to the fallback store.
    Final,
}

struct Inner {
    settings: ClientSettings,
    http: reqwest::Client,
    store: Arc<dyn StateStore>,
    queue: Mutex<VecDeque<TrackedEvent>>,
    is_flushing: AtomicBool,
    retry_count: AtomicU32,
}

/// Cheaply cloneable handle to one buffer instance.
///
/// Clones share the queue and the single-flight latch. Methods that spawn
/// (forced flushes, retries, recovery) must run inside a tokio runtime.
#[derive(Clone)]
pub struct EventBuffer {
    inner: Arc<Inner>,
}

impl EventBuffer {
    /// Buffer posting to `settings.endpoint`, spilling into `store`.
    pub fn new(settings: ClientSettings, store: Arc<dyn StateStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                http: reqwest::Client::new(),
                store,
                queue: Mutex::new(VecDeque::new()),
                is_flushing: AtomicBool::new(false),
                retry_count: AtomicU32::new(0),
            }),
        }
    }

    /// Events waiting in the live queue.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Append an event, forcing a flush first when the queue is full.
    ///
    /// Never blocks: the forced flush snapshots synchronously and sends in
    /// a spawned task. The triggering event always lands in the fresh
    /// queue, behind the forced snapshot.
    pub fn track(&self, event: TrackedEvent) {
        if self.pending() >= self.inner.settings.max_queue_size {
            if let Some(snapshot) = self.begin_flush() {
                debug!(len = snapshot.len(), "queue full, forcing flush");
                let buffer = self.clone();
                drop(tokio::spawn(async move {
                    buffer.send_snapshot(snapshot, FlushMode::Scheduled).await;
                }));
            }
        }
        self.inner.queue.lock().push_back(event);
    }

    /// Flush the queue as one batch.
    ///
    /// No-op when the queue is empty or another flush is in flight.
    pub async fn flush(&self, mode: FlushMode) {
        let Some(snapshot) = self.begin_flush() else {
            return;
        };
        self.send_snapshot(snapshot, mode).await;
    }

    /// Move spilled events from the fallback store to the front of the
    /// queue and schedule a flush for shortly after initialization.
    pub fn recover_failed_events(&self) {
        let recovered = self.read_fallback();
        if recovered.is_empty() {
            return;
        }
        let _ = self.inner.store.remove(FAILED_EVENTS_KEY);
        debug!(count = recovered.len(), "recovered spilled events");

        {
            let mut queue = self.inner.queue.lock();
            for event in recovered.into_iter().rev() {
                queue.push_front(event);
            }
        }

        let buffer = self.clone();
        drop(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(RECOVERY_FLUSH_DELAY_MS)).await;
            buffer.flush(FlushMode::Scheduled).await;
        }));
    }

    /// Acquire the single-flight latch and drain the queue.
    ///
    /// `None` when a flush is already in flight or the queue is empty (the
    /// latch is released again in the empty case).
    fn begin_flush(&self) -> Option<Vec<TrackedEvent>> {
        if self
            .inner
            .is_flushing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return None;
        }
        let snapshot: Vec<TrackedEvent> = {
            let mut queue = self.inner.queue.lock();
            queue.drain(..).collect()
        };
        if snapshot.is_empty() {
            self.inner.is_flushing.store(false, Ordering::SeqCst);
            return None;
        }
        Some(snapshot)
    }

    // Boxed rather than `async fn`: the retry path spawns a task that calls
    // `flush`, which awaits `send_snapshot` again, and the recursive opaque
    // future defeats auto-trait (`Send`) inference.
    fn send_snapshot(
        &self,
        snapshot: Vec<TrackedEvent>,
        mode: FlushMode,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
        match self.post_batch(&snapshot).await {
            Ok(()) => {
                trace!(len = snapshot.len(), "batch delivered");
                self.inner.retry_count.store(0, Ordering::SeqCst);
                self.inner.is_flushing.store(false, Ordering::SeqCst);
            }
            Err(err) => {
                let attempt = self.inner.retry_count.fetch_add(1, Ordering::SeqCst) + 1;
                let retryable = mode == FlushMode::Scheduled
                    && err.is_transient()
                    && attempt < self.inner.settings.max_retries;

                if retryable {
                    debug!(%err, attempt, "delivery failed, scheduling retry");
                    // Failed batch re-enters AHEAD of events queued meanwhile.
                    {
                        let mut queue = self.inner.queue.lock();
                        for event in snapshot.into_iter().rev() {
                            queue.push_front(event);
                        }
                    }
                    self.inner.is_flushing.store(false, Ordering::SeqCst);

                    let delay = Duration::from_millis(
                        self.inner.settings.retry_delay_ms * u64::from(attempt),
                    );
                    let buffer = self.clone();
                    drop(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        buffer.flush(FlushMode::Scheduled).await;
                    }));
                } else {
                    warn!(%err, len = snapshot.len(), "delivery abandoned, spilling to fallback");
                    self.spill(snapshot);
                    self.inner.retry_count.store(0, Ordering::SeqCst);
                    self.inner.is_flushing.store(false, Ordering::SeqCst);
                }
            }
        }
        })
    }

    async fn post_batch(&self, batch: &[TrackedEvent]) -> Result<()> {
        let response = self
            .inner
            .http
            .post(&self.inner.settings.endpoint)
            .json(batch)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status.is_client_error() {
            Err(ClientError::Rejected {
                status: status.as_u16(),
            })
        } else {
            Err(ClientError::ServerError {
                status: status.as_u16(),
            })
        }
    }

    /// Append a snapshot to the fallback store, keeping only the most
    /// recent `failed_event_cap` events.
    fn spill(&self, snapshot: Vec<TrackedEvent>) {
        let mut spilled = self.read_fallback();
        spilled.extend(snapshot);

        let cap = self.inner.settings.failed_event_cap;
        if spilled.len() > cap {
            let excess = spilled.len() - cap;
            drop(spilled.drain(..excess));
        }

        match serde_json::to_string(&spilled) {
            Ok(raw) => {
                if !self.inner.store.set(FAILED_EVENTS_KEY, &raw) {
                    warn!(len = spilled.len(), "fallback store unavailable, events lost");
                }
            }
            Err(err) => warn!(%err, "failed to serialize fallback events"),
        }
    }

    fn read_fallback(&self) -> Vec<TrackedEvent> {
        self.inner
            .store
            .get(FAILED_EVENTS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::MemoryStateStore;
    use pagepulse_core::{EventType, PageContext, TrackedEvent};
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(url: &str) -> TrackedEvent {
        TrackedEvent::now(
            "sess_test",
            EventType::Pageview,
            &PageContext::new(url),
            BTreeMap::new(),
        )
    }

    fn settings(endpoint: &str) -> ClientSettings {
        ClientSettings {
            endpoint: endpoint.to_string(),
            retry_delay_ms: 10,
            ..ClientSettings::default()
        }
    }

    fn buffer(server: &MockServer, store: Arc<dyn StateStore>) -> EventBuffer {
        EventBuffer::new(settings(&format!("{}/api/events", server.uri())), store)
    }

    async fn request_urls(server: &MockServer) -> Vec<Vec<String>> {
        server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|req| {
                let batch: Vec<TrackedEvent> = serde_json::from_slice(&req.body).unwrap();
                batch.into_iter().map(|e| e.url).collect()
            })
            .collect()
    }

    #[tokio::test]
    async fn flush_delivers_batch_and_clears_queue() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/events"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let buffer = buffer(&server, Arc::new(MemoryStateStore::new()));
        buffer.track(event("/a"));
        buffer.track(event("/b"));
        buffer.flush(FlushMode::Scheduled).await;

        assert_eq!(buffer.pending(), 0);
        assert_eq!(request_urls(&server).await, vec![vec!["/a", "/b"]]);
    }

    #[tokio::test]
    async fn flush_with_empty_queue_is_a_noop() {
        let server = MockServer::start().await;
        let buffer = buffer(&server, Arc::new(MemoryStateStore::new()));
        buffer.flush(FlushMode::Scheduled).await;
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn overflow_forces_flush_before_appending() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let buffer = buffer(&server, Arc::new(MemoryStateStore::new()));
        for i in 0..50 {
            buffer.track(event(&format!("/page-{i}")));
        }
        assert_eq!(buffer.pending(), 50);

        // The 51st event trips the valve: the 50 queued events are flushed
        // and the new event lands alone in the fresh queue.
        buffer.track(event("/overflow"));
        assert_eq!(buffer.pending(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        let bodies = request_urls(&server).await;
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0].len(), 50);
        assert!(!bodies[0].contains(&"/overflow".to_string()));
    }

    #[tokio::test]
    async fn concurrent_flush_is_single_flight() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(150)))
            .mount(&server)
            .await;

        let buffer = buffer(&server, Arc::new(MemoryStateStore::new()));
        buffer.track(event("/a"));

        let slow = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.flush(FlushMode::Scheduled).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        // Latch held by the in-flight flush — this returns immediately.
        buffer.flush(FlushMode::Scheduled).await;
        slow.await.unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn transient_failure_requeues_at_front_of_new_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let buffer = buffer(&server, Arc::new(MemoryStateStore::new()));
        buffer.track(event("/failed"));
        buffer.flush(FlushMode::Scheduled).await;
        // Queued while the retry is pending — must deliver AFTER the
        // requeued batch.
        buffer.track(event("/tracked-later"));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let bodies = request_urls(&server).await;
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[1], vec!["/failed", "/tracked-later"]);
    }

    #[tokio::test]
    async fn three_failures_spill_to_fallback_without_a_fourth_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStateStore::new());
        let buffer = buffer(&server, Arc::clone(&store) as Arc<dyn StateStore>);
        buffer.track(event("/doomed"));
        buffer.flush(FlushMode::Scheduled).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        assert_eq!(buffer.pending(), 0);

        let spilled: Vec<TrackedEvent> =
            serde_json::from_str(&store.get(FAILED_EVENTS_KEY).unwrap()).unwrap();
        assert_eq!(spilled.len(), 1);
        assert_eq!(spilled[0].url, "/doomed");
    }

    #[tokio::test]
    async fn client_error_spills_without_retrying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStateStore::new());
        let buffer = buffer(&server, Arc::clone(&store) as Arc<dyn StateStore>);
        buffer.track(event("/rejected"));
        buffer.flush(FlushMode::Scheduled).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert!(store.get(FAILED_EVENTS_KEY).is_some());
    }

    #[tokio::test]
    async fn final_mode_failure_spills_immediately() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStateStore::new());
        let buffer = buffer(&server, Arc::clone(&store) as Arc<dyn StateStore>);
        buffer.track(event("/teardown"));
        buffer.flush(FlushMode::Final).await;

        let spilled: Vec<TrackedEvent> =
            serde_json::from_str(&store.get(FAILED_EVENTS_KEY).unwrap()).unwrap();
        assert_eq!(spilled[0].url, "/teardown");
    }

    #[tokio::test]
    async fn spill_caps_at_most_recent_events() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStateStore::new());
        // Pre-existing spilled events
        let seeded: Vec<TrackedEvent> = (0..4).map(|i| event(&format!("/old-{i}"))).collect();
        assert!(store.set(FAILED_EVENTS_KEY, &serde_json::to_string(&seeded).unwrap()));

        let mut settings = settings(&format!("{}/api/events", server.uri()));
        settings.failed_event_cap = 5;
        settings.max_retries = 1; // first failure spills
        let buffer = EventBuffer::new(settings, Arc::clone(&store) as Arc<dyn StateStore>);

        buffer.track(event("/new-0"));
        buffer.track(event("/new-1"));
        buffer.track(event("/new-2"));
        buffer.flush(FlushMode::Scheduled).await;

        let spilled: Vec<TrackedEvent> =
            serde_json::from_str(&store.get(FAILED_EVENTS_KEY).unwrap()).unwrap();
        let urls: Vec<&str> = spilled.iter().map(|e| e.url.as_str()).collect();
        // Oldest dropped first: old-0 and old-1 fell off the front
        assert_eq!(urls, vec!["/old-2", "/old-3", "/new-0", "/new-1", "/new-2"]);
    }

    #[tokio::test]
    async fn recovery_prepends_spilled_events_and_clears_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStateStore::new());
        let spilled = vec![event("/recovered-0"), event("/recovered-1")];
        assert!(store.set(FAILED_EVENTS_KEY, &serde_json::to_string(&spilled).unwrap()));

        let buffer = buffer(&server, Arc::clone(&store) as Arc<dyn StateStore>);
        buffer.track(event("/live"));
        buffer.recover_failed_events();

        assert_eq!(buffer.pending(), 3);
        assert!(store.get(FAILED_EVENTS_KEY).is_none());

        // Recovered events deliver ahead of the live queue
        buffer.flush(FlushMode::Scheduled).await;
        let bodies = request_urls(&server).await;
        assert_eq!(bodies[0], vec!["/recovered-0", "/recovered-1", "/live"]);
    }

    #[tokio::test]
    async fn recovery_with_empty_store_is_a_noop() {
        let server = MockServer::start().await;
        let buffer = buffer(&server, Arc::new(MemoryStateStore::new()));
        buffer.recover_failed_events();
        assert_eq!(buffer.pending(), 0);
    }

    #[tokio::test]
    async fn success_resets_the_retry_counter() {
        let server = MockServer::start().await;
        // Fail twice, succeed, then fail twice again: the second failure
        // streak must get its own retry budget rather than spilling early.
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryStateStore::new());
        let buffer = buffer(&server, Arc::clone(&store) as Arc<dyn StateStore>);

        buffer.track(event("/first"));
        buffer.flush(FlushMode::Scheduled).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        // Delivered on the third attempt; nothing spilled
        assert!(store.get(FAILED_EVENTS_KEY).is_none());
        assert_eq!(buffer.pending(), 0);

        buffer.track(event("/second"));
        buffer.flush(FlushMode::Scheduled).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        // Fresh streak: three more attempts before spilling
        assert_eq!(server.received_requests().await.unwrap().len(), 6);
        let spilled: Vec<TrackedEvent> =
            serde_json::from_str(&store.get(FAILED_EVENTS_KEY).unwrap()).unwrap();
        assert_eq!(spilled[0].url, "/second");
    }
}
