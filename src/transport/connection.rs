//! WebSocket connection and pump loop.
//!
//! This module owns the WebSocket connection to the browser's debugger
//! endpoint, including call/response correlation and event forwarding.
//!
//! # Pump Loop
//!
//! The connection spawns a tokio task that is the only reader of the socket
//! and the owner of its write half. Each iteration handles one of:
//!
//! - Incoming frames from the browser (responses, events)
//! - Outgoing calls from the client API (serialized through a command channel)
//! - Correlation cleanup for timed-out calls
//! - Shutdown
//!
//! Inbound frames are classified by shape: a frame with an `id` completes
//! the matching pending call; a frame with a `method` and no `id` is
//! forwarded to the event queue in wire order; anything else is logged and
//! dropped. The pump is also the failure sentinel: a socket error or EOF
//! terminates the loop and aborts every pending call, which is how an
//! unexpected browser death becomes visible to in-flight callers.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{CallId, CallIdGenerator};
use crate::protocol::{Call, Event, InboundMessage, Response};

// ============================================================================
// Constants
// ============================================================================

/// Default wall-clock budget for a call.
pub(crate) const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending calls before rejecting new ones.
const MAX_PENDING_CALLS: usize = 100;

// ============================================================================
// Types
// ============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = futures_util::stream::SplitSink<WsStream, Message>;

/// Map of call ids to pending call records.
type PendingMap = FxHashMap<CallId, PendingCall>;

/// A call awaiting its response.
///
/// The method name is kept for error context; the sender delivers the
/// response (or the abort) to the waiting caller.
struct PendingCall {
    method: String,
    tx: oneshot::Sender<Result<Response>>,
}

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the pump loop.
enum ConnectionCommand {
    /// Send a call and register its pending entry.
    Send {
        call: Call,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Remove a timed-out correlation entry.
    RemoveCorrelation(CallId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to a debugger endpoint.
///
/// Handles call/response correlation and event forwarding. The connection
/// spawns an internal pump task; events are pushed into the channel supplied
/// at connect time, in wire order.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync`; share it behind an `Arc` to issue calls
/// from multiple tasks concurrently. Each call owns an independent pending
/// entry, so concurrent calls only contend on the command channel.
pub struct Connection {
    /// Channel for sending commands to the pump loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with the pump loop).
    pending: Arc<Mutex<PendingMap>>,
    /// Call id generator, seeded above manually-assignable ids.
    ids: CallIdGenerator,
    /// Set once the pump loop has terminated.
    closed: Arc<AtomicBool>,
    /// Pump task handle, taken by [`Connection::join`].
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Opens a WebSocket connection and starts the pump loop.
    ///
    /// # Arguments
    ///
    /// * `ws_url` - Resolved debugger WebSocket URL
    /// * `event_tx` - Sink for inbound protocol events, consumed by the
    ///   event router's dispatch loop
    ///
    /// # Errors
    ///
    /// Returns [`Error::WebSocket`] if the connection cannot be established.
    pub async fn connect(ws_url: &str, event_tx: mpsc::UnboundedSender<Event>) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        debug!(url = %ws_url, "WebSocket connection established");

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let pending: Arc<Mutex<PendingMap>> = Arc::new(Mutex::new(FxHashMap::default()));
        let closed = Arc::new(AtomicBool::new(false));

        let pump = tokio::spawn(Self::run_pump(
            ws_stream,
            command_rx,
            Arc::clone(&pending),
            event_tx,
            Arc::clone(&closed),
        ));

        Ok(Self {
            command_tx,
            pending,
            ids: CallIdGenerator::new(),
            closed,
            pump: Mutex::new(Some(pump)),
        })
    }

    /// Sends a call and waits for its response with the default budget (30s).
    ///
    /// # Errors
    ///
    /// See [`Connection::send_with_timeout`].
    pub async fn send(&self, call: Call) -> Result<Response> {
        self.send_with_timeout(call, Some(DEFAULT_CALL_TIMEOUT)).await
    }

    /// Sends a call and waits for its response.
    ///
    /// Assigns the next call id when the call carries none. A `None` budget
    /// waits indefinitely but remains interruptible: shutdown drains the
    /// correlation map and completes every pending wait with
    /// [`Error::Aborted`], so `stop()` is never stalled by this call.
    ///
    /// # Arguments
    ///
    /// * `call` - The call to send
    /// * `budget` - Wall-clock budget, or `None` for no per-call limit
    ///
    /// # Errors
    ///
    /// - [`Error::TransportClosed`] if the connection is closed
    /// - [`Error::Timeout`] if no response arrived within the budget
    /// - [`Error::Aborted`] if shutdown interrupted the wait
    /// - [`Error::Protocol`] if too many calls are pending
    pub async fn send_with_timeout(
        &self,
        mut call: Call,
        budget: Option<Duration>,
    ) -> Result<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::TransportClosed);
        }

        // Check pending call limit
        {
            let pending = self.pending.lock();
            if pending.len() >= MAX_PENDING_CALLS {
                warn!(
                    pending = pending.len(),
                    max = MAX_PENDING_CALLS,
                    "Too many pending calls"
                );
                return Err(Error::protocol(format!(
                    "Too many pending calls: {}/{}",
                    pending.len(),
                    MAX_PENDING_CALLS
                )));
            }
        }

        let id = match call.id {
            Some(id) => id,
            None => {
                let id = self.ids.next_id();
                call.id = Some(id);
                id
            }
        };
        let method = call.method.clone();

        // Ship to the pump loop; registration happens there, before the
        // frame is written.
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(ConnectionCommand::Send { call, response_tx })
            .map_err(|_| Error::TransportClosed)?;

        match budget {
            Some(duration) => match timeout(duration, response_rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(Error::aborted(method)),
                Err(_) => {
                    // Timeout - clean up the correlation entry
                    let _ = self
                        .command_tx
                        .send(ConnectionCommand::RemoveCorrelation(id));

                    Err(Error::timeout(method, duration.as_millis() as u64))
                }
            },
            None => match response_rx.await {
                Ok(result) => result,
                Err(_) => Err(Error::aborted(method)),
            },
        }
    }

    /// Returns the number of pending calls.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns `true` once the pump loop has terminated.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Signals the pump loop to shut down.
    ///
    /// Idempotent and non-blocking; tolerates an already-dead pump. Pending
    /// calls are aborted when the pump drains them on exit.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }

    /// Waits for the pump loop to terminate.
    ///
    /// Call after [`Connection::shutdown`] so background work observes the
    /// signal before the connection is dropped.
    pub async fn join(&self) {
        let handle = self.pump.lock().take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Connection pump task failed");
        }
    }
}

// ============================================================================
// Connection - Pump Loop
// ============================================================================

impl Connection {
    /// Pump loop: the sole socket reader and writer.
    async fn run_pump(
        ws_stream: WsStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        pending: Arc<Mutex<PendingMap>>,
        event_tx: mpsc::UnboundedSender<Event>,
        closed: Arc<AtomicBool>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Inbound frames from the browser
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::route_frame(&text, &pending, &event_tx);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by remote");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from the client API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { call, response_tx }) => {
                            Self::handle_send(call, response_tx, &mut ws_write, &pending).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(id)) => {
                            if pending.lock().remove(&id).is_some() {
                                debug!(%id, "Removed timed-out call");
                            }
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        closed.store(true, Ordering::SeqCst);
        Self::abort_pending(&pending);

        debug!("Connection pump terminated");
    }

    /// Classifies one inbound text frame and routes it.
    fn route_frame(
        text: &str,
        pending: &Arc<Mutex<PendingMap>>,
        event_tx: &mpsc::UnboundedSender<Event>,
    ) {
        match InboundMessage::classify(text) {
            Ok(InboundMessage::Response(response)) => {
                let entry = pending.lock().remove(&response.id);

                match entry {
                    Some(entry) => {
                        let _ = entry.tx.send(Ok(response));
                    }
                    None => {
                        warn!(id = %response.id, "Response for unknown or expired call");
                    }
                }
            }

            Ok(InboundMessage::Event(event)) => {
                // Router gone means the client is tearing down; nothing to do.
                if event_tx.send(event).is_err() {
                    trace!("Event dropped, router closed");
                }
            }

            Err(e) => {
                warn!(error = %e, "Dropping unclassifiable frame");
            }
        }
    }

    /// Handles a send command from the client API.
    async fn handle_send(
        call: Call,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut WsSink,
        pending: &Arc<Mutex<PendingMap>>,
    ) {
        let Some(id) = call.id else {
            let _ = response_tx.send(Err(Error::protocol("call submitted without id")));
            return;
        };
        let method = call.method.clone();

        // Serialize call
        let json = match serde_json::to_string(&call) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::Json(e)));
                return;
            }
        };

        // Register correlation before sending
        pending.lock().insert(
            id,
            PendingCall {
                method: method.clone(),
                tx: response_tx,
            },
        );

        // Ship the frame
        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            // Remove correlation and notify the caller
            if let Some(entry) = pending.lock().remove(&id) {
                let _ = entry.tx.send(Err(Error::WebSocket(e)));
            }
            return;
        }

        trace!(%id, method = %method, "Call sent");
    }

    /// Aborts all pending calls on pump exit.
    fn abort_pending(pending: &Arc<Mutex<PendingMap>>) {
        let drained: Vec<_> = {
            let mut pending = pending.lock();
            pending.drain().collect()
        };
        let count = drained.len();

        for (_, entry) in drained {
            let _ = entry.tx.send(Err(Error::aborted(entry.method)));
        }

        if count > 0 {
            debug!(count, "Aborted pending calls on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio_test::assert_ok;

    /// Spawns an in-process debugger endpoint.
    ///
    /// `behavior` receives each inbound call and returns the frames to send
    /// back, in order. Returns the endpoint's WebSocket URL.
    async fn fake_endpoint<F>(mut behavior: F) -> String
    where
        F: FnMut(Value) -> Vec<String> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();

            while let Some(Ok(message)) = read.next().await {
                if let Message::Text(text) = message {
                    let value: Value = serde_json::from_str(&text).expect("inbound json");
                    for reply in behavior(value) {
                        if write.send(Message::Text(reply.into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        format!("ws://127.0.0.1:{port}")
    }

    /// Behavior that answers every call with `{"result": {"echo": <id>}}`.
    fn echo_behavior(call: Value) -> Vec<String> {
        let id = call["id"].as_u64().expect("call id");
        vec![json!({"id": id, "result": {"echo": id}}).to_string()]
    }

    async fn connect(url: &str) -> (Connection, mpsc::UnboundedReceiver<Event>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connection = Connection::connect(url, event_tx).await.expect("connect");
        (connection, event_rx)
    }

    #[tokio::test]
    async fn test_round_trip() {
        let url = fake_endpoint(echo_behavior).await;
        let (connection, _event_rx) = connect(&url).await;

        let response = assert_ok!(
            connection
                .send(Call::new("Browser.getVersion", json!({})))
                .await
        );

        assert_eq!(response.id, CallId::new(1001));
        assert_eq!(response.result.expect("result")["echo"], 1001);
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_ids_strictly_increasing_on_wire() {
        let url = fake_endpoint(echo_behavior).await;
        let (connection, _event_rx) = connect(&url).await;

        let first = connection
            .send(Call::new("Page.enable", json!({})))
            .await
            .expect("first");
        let second = connection
            .send(Call::new("Page.enable", json!({})))
            .await
            .expect("second");

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_concurrent_calls_matched_by_id_not_arrival_order() {
        // Hold the first call's response until the second call arrives,
        // then answer in reverse order.
        let mut held: Option<Value> = None;
        let url = fake_endpoint(move |call| {
            if held.is_none() {
                held = Some(call);
                Vec::new()
            } else {
                let first = held.take().expect("held call");
                let mut replies = echo_behavior(call);
                replies.extend(echo_behavior(first));
                replies
            }
        })
        .await;

        let (connection, _event_rx) = connect(&url).await;
        let connection = Arc::new(connection);

        let a = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                connection
                    .send(Call::new("Target.getTargets", json!({})))
                    .await
            })
        };
        let b = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                connection
                    .send(Call::new("Target.getTargets", json!({})))
                    .await
            })
        };

        let a = a.await.expect("join").expect("response");
        let b = b.await.expect("join").expect("response");

        // Each caller got exactly the response matching its own id.
        assert_eq!(a.result.expect("result")["echo"], a.id.value());
        assert_eq!(b.result.expect("result")["echo"], b.id.value());
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_timeout_cleans_pending_entry() {
        let url = fake_endpoint(|_| Vec::new()).await;
        let (connection, _event_rx) = connect(&url).await;

        let err = connection
            .send_with_timeout(
                Call::new("Page.navigate", json!({"url": "about:blank"})),
                Some(Duration::from_millis(100)),
            )
            .await
            .unwrap_err();

        match err {
            Error::Timeout { method, timeout_ms } => {
                assert_eq!(method, "Page.navigate");
                assert_eq!(timeout_ms, 100);
            }
            other => panic!("expected Timeout, got {other}"),
        }

        // Let the pump process the RemoveCorrelation command.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_unbounded_wait() {
        let url = fake_endpoint(|_| Vec::new()).await;
        let (connection, _event_rx) = connect(&url).await;
        let connection = Arc::new(connection);

        let waiter = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move {
                connection
                    .send_with_timeout(Call::new("Runtime.evaluate", json!({})), None)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        connection.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("stop() must unblock the waiter")
            .expect("join");

        match result.unwrap_err() {
            Error::Aborted { method } => assert_eq!(method, "Runtime.evaluate"),
            other => panic!("expected Aborted, got {other}"),
        }

        connection.join().await;
        assert!(connection.is_closed());
        assert_eq!(connection.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_frame_does_not_kill_pump() {
        let url = fake_endpoint(|call| {
            let mut replies = vec![json!({"neither": "id nor method"}).to_string()];
            replies.extend(echo_behavior(call));
            replies
        })
        .await;

        let (connection, _event_rx) = connect(&url).await;

        // The call still resolves despite the garbage frame before it.
        let response = connection
            .send(Call::new("Page.enable", json!({})))
            .await
            .expect("response");
        assert!(!response.is_error());
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_unknown_response_id_is_dropped() {
        let url = fake_endpoint(|call| {
            let mut replies = vec![json!({"id": 99_999, "result": {}}).to_string()];
            replies.extend(echo_behavior(call));
            replies
        })
        .await;

        let (connection, _event_rx) = connect(&url).await;

        let response = connection
            .send(Call::new("Page.enable", json!({})))
            .await
            .expect("response");
        assert_eq!(response.result.expect("result")["echo"], response.id.value());
    }

    #[tokio::test]
    async fn test_events_forwarded_in_wire_order() {
        let url = fake_endpoint(|call| {
            vec![
                json!({"method": "Page.frameStartedLoading", "params": {"n": 1}}).to_string(),
                json!({"method": "Page.loadEventFired", "params": {"n": 2}}).to_string(),
                echo_behavior(call).remove(0),
            ]
        })
        .await;

        let (connection, mut event_rx) = connect(&url).await;

        connection
            .send(Call::new("Page.enable", json!({})))
            .await
            .expect("response");

        let first = event_rx.recv().await.expect("first event");
        let second = event_rx.recv().await.expect("second event");
        assert_eq!(first.method, "Page.frameStartedLoading");
        assert_eq!(second.method, "Page.loadEventFired");
    }

    #[tokio::test]
    async fn test_manual_call_id_is_respected() {
        let url = fake_endpoint(echo_behavior).await;
        let (connection, _event_rx) = connect(&url).await;

        let response = connection
            .send(Call::with_id(CallId::new(7), "Page.enable", json!({})))
            .await
            .expect("response");
        assert_eq!(response.id, CallId::new(7));
    }

    #[tokio::test]
    async fn test_send_after_close_fails_fast() {
        let url = fake_endpoint(echo_behavior).await;
        let (connection, _event_rx) = connect(&url).await;

        connection.shutdown();
        connection.join().await;

        let err = connection
            .send(Call::new("Page.enable", json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TransportClosed));
    }
}
