//! Event routing and dispatch.
//!
//! Inbound protocol events are queued by the connection pump and consumed
//! here by a dedicated dispatch task, so a slow or misbehaving handler never
//! blocks the socket reader.
//!
//! # Handler Keys
//!
//! The handler table is keyed by [`SessionMode`]:
//!
//! - [`SessionMode::Single`]: bare event name, e.g. `"Page.loadEventFired"`.
//! - [`SessionMode::Multi`]: `"{sessionId}.{event}"`; events without a
//!   session id use the reserved `"main"` session. Lookup tries the exact
//!   scoped key first, then falls back to the `"main"` key.
//!
//! Unhandled events are expected and common; they are dropped at trace
//! level, never an error.

// ============================================================================
// Imports
// ============================================================================

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use crate::identifiers::SessionId;
use crate::protocol::Event;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback.
///
/// Called with the event's `params` body for each matching event, in wire
/// order. Handlers run sequentially on the dispatch task; a panicking
/// handler is caught and logged without stopping dispatch.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync>;

/// Map of handler keys to callbacks.
type HandlerMap = FxHashMap<String, EventHandler>;

// ============================================================================
// SessionMode
// ============================================================================

/// Session model for event handler keys.
///
/// One physical connection may carry a single implicit target or multiplex
/// several via session ids; the two schemes key the handler table
/// differently, so the choice is explicit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionMode {
    /// Handlers keyed by bare event name. Session ids on events are ignored.
    #[default]
    Single,

    /// Handlers keyed by `"{sessionId}.{event}"` with a `"main"` fallback.
    Multi,
}

// ============================================================================
// EventRouter
// ============================================================================

/// Routes protocol events to registered handlers.
///
/// The router owns the event queue's endpoints: the connection pump pushes
/// into a sender obtained from [`EventRouter::event_sender`], and a spawned
/// dispatch task drains the receiver. The dispatch loop exits once every
/// sender is dropped ([`EventRouter::close`] drops the router's own), which
/// makes [`EventRouter::join`] deterministic during shutdown.
pub struct EventRouter {
    /// Handler key scheme.
    mode: SessionMode,
    /// Registered handlers (shared with the dispatch task).
    handlers: Arc<Mutex<HandlerMap>>,
    /// Queue sender, handed out to the connection; dropped by `close`.
    event_tx: Mutex<Option<mpsc::UnboundedSender<Event>>>,
    /// Queue receiver, taken by `spawn_dispatch`.
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<Event>>>,
    /// Dispatch task handle, taken by `join`.
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl EventRouter {
    /// Creates a router for the given session mode.
    #[must_use]
    pub fn new(mode: SessionMode) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            mode,
            handlers: Arc::new(Mutex::new(FxHashMap::default())),
            event_tx: Mutex::new(Some(event_tx)),
            event_rx: Mutex::new(Some(event_rx)),
            dispatch: Mutex::new(None),
        }
    }

    /// Returns a sender for enqueueing events, or `None` after `close`.
    #[must_use]
    pub fn event_sender(&self) -> Option<mpsc::UnboundedSender<Event>> {
        self.event_tx.lock().clone()
    }

    /// Starts the dispatch task.
    ///
    /// No-op if the task was already started.
    pub fn spawn_dispatch(&self) {
        let Some(event_rx) = self.event_rx.lock().take() else {
            warn!("Dispatch task already started");
            return;
        };

        let handlers = Arc::clone(&self.handlers);
        let mode = self.mode;
        let handle = tokio::spawn(Self::run_dispatch(event_rx, handlers, mode));

        *self.dispatch.lock() = Some(handle);
    }

    /// Registers a handler under a key.
    ///
    /// Replaces any previous handler for the same key.
    pub fn on(&self, key: impl Into<String>, handler: impl Fn(Value) + Send + Sync + 'static) {
        let key = key.into();
        debug!(key = %key, "Handler registered");
        self.handlers.lock().insert(key, Arc::new(handler));
    }

    /// Unregisters the handler for a key.
    ///
    /// Removal of an unknown key is a no-op, not an error. Returns `true`
    /// if a handler was present.
    pub fn off(&self, key: &str) -> bool {
        self.handlers.lock().remove(key).is_some()
    }

    /// Clears all registered handlers.
    pub fn remove_all(&self) {
        self.handlers.lock().clear();
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Drops the router's queue sender.
    ///
    /// Once the connection's sender is gone too, the dispatch loop drains
    /// the queue and exits.
    pub fn close(&self) {
        self.event_tx.lock().take();
    }

    /// Waits for the dispatch task to terminate.
    pub async fn join(&self) {
        let handle = self.dispatch.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Dispatch task failed");
        }
    }
}

// ============================================================================
// EventRouter - Dispatch Loop
// ============================================================================

impl EventRouter {
    /// Dispatch loop: one event at a time, in queue order.
    async fn run_dispatch(
        mut event_rx: mpsc::UnboundedReceiver<Event>,
        handlers: Arc<Mutex<HandlerMap>>,
        mode: SessionMode,
    ) {
        while let Some(event) = event_rx.recv().await {
            Self::dispatch_event(&event, &handlers, mode);
        }

        debug!("Event dispatch loop terminated");
    }

    /// Resolves the handler for one event and invokes it.
    fn dispatch_event(event: &Event, handlers: &Mutex<HandlerMap>, mode: SessionMode) {
        // Clone the handler out so registration calls from inside a handler
        // cannot deadlock on the table lock.
        let handler = {
            let map = handlers.lock();
            match mode {
                SessionMode::Single => map.get(event.method.as_str()).cloned(),
                SessionMode::Multi => {
                    let session = event
                        .session_id
                        .as_ref()
                        .map(SessionId::as_str)
                        .unwrap_or(SessionId::MAIN);
                    let scoped = format!("{session}.{}", event.method);

                    map.get(&scoped)
                        .cloned()
                        .or_else(|| map.get(&format!("{}.{}", SessionId::MAIN, event.method)).cloned())
                }
            }
        };

        let Some(handler) = handler else {
            trace!(method = %event.method, "No handler registered, event dropped");
            return;
        };

        let params = event.params.clone();
        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(params))) {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());

            error!(method = %event.method, reason = %reason, "Event handler panicked");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    fn event(method: &str, params: Value, session: Option<&str>) -> Event {
        Event {
            method: method.to_string(),
            params,
            session_id: session.map(SessionId::from),
        }
    }

    /// Sends events through a running router and gives dispatch time to run.
    async fn deliver(router: &EventRouter, events: Vec<Event>) {
        let tx = router.event_sender().expect("sender");
        for e in events {
            tx.send(e).expect("enqueue");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_handler_invoked_once_with_params() {
        let router = EventRouter::new(SessionMode::Single);
        router.spawn_dispatch();

        let calls = Arc::new(AtomicUsize::new(0));
        let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            router.on("Page.loadEventFired", move |params| {
                calls.fetch_add(1, Ordering::SeqCst);
                *seen.lock() = Some(params);
            });
        }

        deliver(
            &router,
            vec![event("Page.loadEventFired", json!({"timestamp": 1.5}), None)],
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(seen.lock().clone().expect("params")["timestamp"], 1.5);

        router.close();
        router.join().await;
    }

    #[tokio::test]
    async fn test_unhandled_event_is_dropped_silently() {
        let router = EventRouter::new(SessionMode::Single);
        router.spawn_dispatch();

        deliver(&router, vec![event("Network.requestWillBeSent", json!({}), None)]).await;

        // Nothing registered, nothing crashed; the loop still drains.
        router.close();
        router.join().await;
    }

    #[tokio::test]
    async fn test_off_unknown_key_is_noop() {
        let router = EventRouter::new(SessionMode::Single);
        assert!(!router.off("Page.neverRegistered"));
    }

    #[tokio::test]
    async fn test_off_removes_handler() {
        let router = EventRouter::new(SessionMode::Single);
        router.spawn_dispatch();

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            router.on("Page.loadEventFired", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert!(router.off("Page.loadEventFired"));

        deliver(&router, vec![event("Page.loadEventFired", json!({}), None)]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        router.close();
        router.join().await;
    }

    #[tokio::test]
    async fn test_panicking_handler_does_not_stop_dispatch() {
        let router = EventRouter::new(SessionMode::Single);
        router.spawn_dispatch();

        let calls = Arc::new(AtomicUsize::new(0));
        router.on("Page.crash", |_| panic!("handler blew up"));
        {
            let calls = Arc::clone(&calls);
            router.on("Page.ok", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        deliver(
            &router,
            vec![
                event("Page.crash", json!({}), None),
                event("Page.ok", json!({}), None),
            ],
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);

        router.close();
        router.join().await;
    }

    #[tokio::test]
    async fn test_multi_mode_sessioned_event_matches_scoped_key() {
        let router = EventRouter::new(SessionMode::Multi);
        router.spawn_dispatch();

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            router.on("main.Page.loaded", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        deliver(&router, vec![event("Page.loaded", json!({}), Some("main"))]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        router.close();
        router.join().await;
    }

    #[tokio::test]
    async fn test_multi_mode_falls_back_to_main_key() {
        let router = EventRouter::new(SessionMode::Multi);
        router.spawn_dispatch();

        let calls = Arc::new(AtomicUsize::new(0));
        {
            let calls = Arc::clone(&calls);
            router.on("main.Page.loaded", move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        // Event scoped to another session falls back to the main key.
        deliver(&router, vec![event("Page.loaded", json!({}), Some("9A3C"))]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        router.close();
        router.join().await;
    }

    #[tokio::test]
    async fn test_multi_mode_exact_key_preferred_over_fallback() {
        let router = EventRouter::new(SessionMode::Multi);
        router.spawn_dispatch();

        let scoped_calls = Arc::new(AtomicUsize::new(0));
        let main_calls = Arc::new(AtomicUsize::new(0));
        {
            let scoped_calls = Arc::clone(&scoped_calls);
            router.on("9A3C.Page.loaded", move |_| {
                scoped_calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        {
            let main_calls = Arc::clone(&main_calls);
            router.on("main.Page.loaded", move |_| {
                main_calls.fetch_add(1, Ordering::SeqCst);
            });
        }

        deliver(&router, vec![event("Page.loaded", json!({}), Some("9A3C"))]).await;

        assert_eq!(scoped_calls.load(Ordering::SeqCst), 1);
        assert_eq!(main_calls.load(Ordering::SeqCst), 0);

        router.close();
        router.join().await;
    }

    #[tokio::test]
    async fn test_remove_all_clears_table() {
        let router = EventRouter::new(SessionMode::Single);
        router.on("Page.a", |_| {});
        router.on("Page.b", |_| {});
        assert_eq!(router.handler_count(), 2);

        router.remove_all();
        assert_eq!(router.handler_count(), 0);
    }

    #[tokio::test]
    async fn test_events_dispatched_in_order() {
        let router = EventRouter::new(SessionMode::Single);
        router.spawn_dispatch();

        let order: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        {
            let order = Arc::clone(&order);
            router.on("Page.tick", move |params| {
                order.lock().push(params["n"].as_u64().expect("n"));
            });
        }

        deliver(
            &router,
            (1..=5)
                .map(|n| event("Page.tick", json!({"n": n}), None))
                .collect(),
        )
        .await;

        assert_eq!(*order.lock(), vec![1, 2, 3, 4, 5]);

        router.close();
        router.join().await;
    }
}
