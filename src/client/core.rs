//! Client façade and lifecycle state machine.
//!
//! [`Client`] composes the transport, the correlating connection, the event
//! router and (in standalone mode) the process supervisor behind a small
//! API: `start`, `stop`, `call`, `on`/`off`.
//!
//! # Lifecycle
//!
//! ```text
//! Initial ──start()──► Started ──stop()──► Stopped (terminal)
//! ```
//!
//! `start()` while `Started` is an idempotent no-op; `Stopped` is terminal.
//! `call()` is only legal while `Started` and fails fast otherwise, without
//! touching the transport.
//!
//! # Example
//!
//! ```no_run
//! use chrome_cdp::{Client, ChromeOptions, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .launch(ChromeOptions::headless())
//!         .build()?;
//!
//!     client.start().await?;
//!     client.on("Page.loadEventFired", |params| {
//!         println!("loaded: {params}");
//!     });
//!
//!     client.call("Page.enable", json!({})).await?;
//!     client.call("Page.navigate", json!({"url": "https://example.com"})).await?;
//!
//!     client.stop().await?;
//!     Ok(())
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::SessionId;
use crate::launcher::{ChromeOptions, ChromeService};
use crate::protocol::Call;
use crate::transport::connection::DEFAULT_CALL_TIMEOUT;
use crate::transport::discovery::DEFAULT_DISCOVERY_DEADLINE;
use crate::transport::{Connection, Discovery};

use super::router::{EventRouter, SessionMode};

// ============================================================================
// ClientStatus
// ============================================================================

/// Lifecycle state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// Built but not yet started.
    Initial,
    /// Connected; calls are legal.
    Started,
    /// Stopped. Terminal: the instance cannot be restarted.
    Stopped,
}

// ============================================================================
// Endpoint
// ============================================================================

/// Where the client gets its debugger connection from.
#[derive(Debug, Clone)]
enum Endpoint {
    /// Attach to an already-resolved WebSocket URL.
    WebSocket(String),
    /// Attach to a running browser via its HTTP discovery endpoint.
    Base(String),
    /// Launch a browser process and discover its endpoint (standalone mode).
    Launch(ChromeOptions),
}

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] instance.
///
/// Use [`Client::builder()`] to create a new builder. Exactly one endpoint
/// source must be configured.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// Endpoint source; the last setter wins.
    endpoint: Option<Endpoint>,
    /// Event handler key scheme.
    session_mode: SessionMode,
    /// Default per-call budget; `None` disables it.
    call_timeout: Option<Option<Duration>>,
    /// Budget for resolving the WebSocket URL.
    discovery_deadline: Option<Duration>,
}

impl ClientBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches to an already-resolved WebSocket debugger URL.
    #[inline]
    #[must_use]
    pub fn websocket_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(Endpoint::WebSocket(url.into()));
        self
    }

    /// Attaches to a running browser via its HTTP base URL
    /// (e.g. `http://localhost:9222`).
    #[inline]
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(Endpoint::Base(url.into()));
        self
    }

    /// Launches a browser process with the given options (standalone mode).
    #[inline]
    #[must_use]
    pub fn launch(mut self, options: ChromeOptions) -> Self {
        self.endpoint = Some(Endpoint::Launch(options));
        self
    }

    /// Sets the session model for event handler keys.
    #[inline]
    #[must_use]
    pub fn session_mode(mut self, mode: SessionMode) -> Self {
        self.session_mode = mode;
        self
    }

    /// Sets the default per-call budget (default 30s).
    #[inline]
    #[must_use]
    pub fn call_timeout(mut self, budget: Duration) -> Self {
        self.call_timeout = Some(Some(budget));
        self
    }

    /// Disables the default per-call budget.
    ///
    /// Calls then wait until a response arrives or the client stops.
    #[inline]
    #[must_use]
    pub fn no_call_timeout(mut self) -> Self {
        self.call_timeout = Some(None);
        self
    }

    /// Sets the budget for resolving the WebSocket URL (default 30s).
    #[inline]
    #[must_use]
    pub fn discovery_deadline(mut self, deadline: Duration) -> Self {
        self.discovery_deadline = Some(deadline);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no endpoint source was configured.
    pub fn build(self) -> Result<Client> {
        let endpoint = self.endpoint.ok_or_else(|| {
            Error::config(
                "An endpoint is required. Use .websocket_url(), .base_url() or .launch().\n\
                 Example: Client::builder().base_url(\"http://localhost:9222\")",
            )
        })?;

        Ok(Client {
            endpoint,
            call_timeout: self.call_timeout.unwrap_or(Some(DEFAULT_CALL_TIMEOUT)),
            discovery_deadline: self.discovery_deadline.unwrap_or(DEFAULT_DISCOVERY_DEADLINE),
            status: Mutex::new(ClientStatus::Initial),
            connection: Mutex::new(None),
            router: EventRouter::new(self.session_mode),
            service: Mutex::new(None),
            op_lock: tokio::sync::Mutex::new(()),
        })
    }
}

// ============================================================================
// Client
// ============================================================================

/// Chrome DevTools Protocol client.
///
/// Each instance owns its connection, correlation state and handler table;
/// multiple clients in one process are fully independent. Share behind an
/// `Arc` to issue calls from several tasks concurrently.
pub struct Client {
    /// Endpoint source.
    endpoint: Endpoint,
    /// Default per-call budget.
    call_timeout: Option<Duration>,
    /// Budget for resolving the WebSocket URL.
    discovery_deadline: Duration,
    /// Lifecycle state.
    status: Mutex<ClientStatus>,
    /// Active connection while `Started`.
    connection: Mutex<Option<Arc<Connection>>>,
    /// Event router and its dispatch loop.
    router: EventRouter,
    /// Supervised browser process (standalone mode only).
    service: Mutex<Option<ChromeService>>,
    /// Serializes `start`/`stop` transitions.
    op_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("call_timeout", &self.call_timeout)
            .field("discovery_deadline", &self.discovery_deadline)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Public API
// ============================================================================

impl Client {
    /// Creates a configuration builder for the client.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        *self.status.lock()
    }

    /// Starts the client.
    ///
    /// Resolves the WebSocket URL (launching the browser first in
    /// standalone mode), opens the connection and starts the background
    /// pump and dispatch loops. Calling `start()` on an already-started
    /// client is an idempotent no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::Stopped`] if the client was already stopped (terminal)
    /// - [`Error::ServiceUnavailable`] if the browser never became reachable
    /// - [`Error::WebSocket`] if the connection cannot be established
    pub async fn start(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        match self.status() {
            ClientStatus::Started => return Ok(()),
            ClientStatus::Stopped => return Err(Error::Stopped),
            ClientStatus::Initial => {}
        }

        let (connection, service) = self.open().await?;

        *self.connection.lock() = Some(connection);
        *self.service.lock() = service;
        self.router.spawn_dispatch();
        *self.status.lock() = ClientStatus::Started;

        info!("Client started");
        Ok(())
    }

    /// Issues a method call with the default budget and no session scope.
    ///
    /// # Errors
    ///
    /// See [`Client::call_with_timeout`].
    pub async fn call(&self, method: impl Into<String>, params: Value) -> Result<Value> {
        self.call_inner(method.into(), params, None, self.call_timeout)
            .await
    }

    /// Issues a method call with an explicit budget.
    ///
    /// # Arguments
    ///
    /// * `method` - Method name in `Domain.method` format (opaque)
    /// * `params` - Named parameters; must be a JSON object (or `Null`)
    /// * `budget` - Wall-clock budget, or `None` to wait until shutdown
    ///
    /// # Errors
    ///
    /// - [`Error::NotStarted`] if the client is not started
    /// - [`Error::InvalidArgument`] if `params` is not a name-value map
    /// - [`Error::Timeout`] if the budget elapsed without a response
    /// - [`Error::Aborted`] if `stop()` interrupted the call
    /// - [`Error::CallFailed`] if the browser returned a protocol error
    pub async fn call_with_timeout(
        &self,
        method: impl Into<String>,
        params: Value,
        budget: Option<Duration>,
    ) -> Result<Value> {
        self.call_inner(method.into(), params, None, budget).await
    }

    /// Issues a method call scoped to a session.
    ///
    /// # Errors
    ///
    /// See [`Client::call_with_timeout`].
    pub async fn call_in_session(
        &self,
        session_id: SessionId,
        method: impl Into<String>,
        params: Value,
    ) -> Result<Value> {
        self.call_inner(method.into(), params, Some(session_id), self.call_timeout)
            .await
    }

    /// Registers an event handler.
    ///
    /// The key is a bare event name in single-session mode, or
    /// `"{sessionId}.{event}"` in multi-session mode. Replaces any previous
    /// handler for the same key.
    pub fn on(&self, key: impl Into<String>, handler: impl Fn(Value) + Send + Sync + 'static) {
        self.router.on(key, handler);
    }

    /// Registers an event handler scoped to a session (multi-session mode).
    pub fn on_session(
        &self,
        session_id: &SessionId,
        event: &str,
        handler: impl Fn(Value) + Send + Sync + 'static,
    ) {
        self.router.on(format!("{session_id}.{event}"), handler);
    }

    /// Unregisters the handler for a key.
    ///
    /// A no-op for keys that were never registered. Returns `true` if a
    /// handler was present.
    pub fn off(&self, key: &str) -> bool {
        self.router.off(key)
    }

    /// Unregisters all event handlers.
    pub fn remove_all_listeners(&self) {
        self.router.remove_all();
    }

    /// Stops the client.
    ///
    /// Signals shutdown (unblocking every in-flight call with
    /// [`Error::Aborted`]), joins the pump and dispatch loops, closes the
    /// transport and, in standalone mode, stops the browser process.
    /// Calling `stop()` on an already-stopped client is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] if the client was never started.
    pub async fn stop(&self) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        match self.status() {
            ClientStatus::Stopped => return Ok(()),
            ClientStatus::Initial => return Err(Error::NotStarted),
            ClientStatus::Started => {}
        }

        *self.status.lock() = ClientStatus::Stopped;

        // Signal before join before close, so background loops observe the
        // signal instead of faulting on a dead transport.
        let connection = self.connection.lock().take();
        if let Some(connection) = &connection {
            connection.shutdown();
            connection.join().await;
        }

        self.router.close();
        self.router.join().await;

        let service = self.service.lock().take();
        if let Some(mut service) = service {
            service.stop().await;
        }

        info!("Client stopped");
        Ok(())
    }
}

// ============================================================================
// Client - Internal
// ============================================================================

impl Client {
    /// Resolves the endpoint and opens the connection.
    ///
    /// On failure after a standalone launch, the spawned browser is stopped
    /// again before the error propagates.
    async fn open(&self) -> Result<(Arc<Connection>, Option<ChromeService>)> {
        let (ws_url, mut service) = match &self.endpoint {
            Endpoint::WebSocket(url) => (url.clone(), None),

            Endpoint::Base(url) => {
                let ws_url = Discovery::new(url)?
                    .websocket_url(self.discovery_deadline)
                    .await?;
                (ws_url, None)
            }

            Endpoint::Launch(options) => {
                let mut service = ChromeService::new(options.clone());
                let base_url = service.start().await?;

                match Discovery::new(&base_url)?
                    .websocket_url(self.discovery_deadline)
                    .await
                {
                    Ok(ws_url) => (ws_url, Some(service)),
                    Err(e) => {
                        service.stop().await;
                        return Err(e);
                    }
                }
            }
        };

        let event_tx = match self.router.event_sender() {
            Some(tx) => tx,
            None => {
                if let Some(service) = &mut service {
                    service.stop().await;
                }
                return Err(Error::Stopped);
            }
        };

        match Connection::connect(&ws_url, event_tx).await {
            Ok(connection) => Ok((Arc::new(connection), service)),
            Err(e) => {
                if let Some(service) = &mut service {
                    service.stop().await;
                }
                Err(e)
            }
        }
    }

    /// Shared call path: lifecycle check, param validation, send, unwrap.
    async fn call_inner(
        &self,
        method: String,
        params: Value,
        session_id: Option<SessionId>,
        budget: Option<Duration>,
    ) -> Result<Value> {
        if self.status() != ClientStatus::Started {
            return Err(Error::NotStarted);
        }

        // Protocol params are always name-value maps; reject positional
        // shapes before anything reaches the transport.
        let params = match params {
            Value::Object(_) => params,
            Value::Null => Value::Object(serde_json::Map::new()),
            other => {
                return Err(Error::invalid_argument(format!(
                    "params for {method} must be a name-value map, got {}",
                    json_type_name(&other)
                )));
            }
        };

        let connection = self
            .connection
            .lock()
            .clone()
            .ok_or(Error::NotStarted)?;

        let mut call = Call::new(method.as_str(), params);
        if let Some(session_id) = session_id {
            call = call.in_session(session_id);
        }

        let response = connection.send_with_timeout(call, budget).await?;
        let result = response.into_result(&method);

        if let Err(e) = &result {
            warn!(method = %method, error = %e, "Call failed");
        }

        result
    }
}

// ============================================================================
// Client - Drop
// ============================================================================

impl Drop for Client {
    fn drop(&mut self) {
        // Best-effort: fire the shutdown signal without awaiting. The pump
        // closes the socket, `kill_on_drop` reclaims the process and the
        // TempDir removes the profile.
        if *self.status.get_mut() == ClientStatus::Started {
            if let Some(connection) = self.connection.get_mut().take() {
                connection.shutdown();
            }
            self.router.close();
            debug!("Client dropped while started; shutdown signalled");
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Names a JSON value's type for error messages.
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Tests
// ============================================================================
