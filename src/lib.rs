//! Chrome DevTools Protocol client.
//!
//! This library speaks the Chrome DevTools Protocol (CDP) over the
//! remote-debugging WebSocket a Chromium-based browser exposes: it issues
//! JSON-RPC-style method calls, correlates their responses by id, and routes
//! unsolicited protocol events to registered handlers.
//!
//! # Architecture
//!
//! One started [`Client`] runs two background tasks:
//!
//! - **Connection pump**: the sole reader of the WebSocket; classifies each
//!   inbound frame as a response (matched to its caller by id) or an event
//!   (queued for dispatch), and owns the write half so sends serialize
//!   through it.
//! - **Event dispatch loop**: invokes registered handlers one at a time in
//!   wire order, isolated from the pump so a slow handler never stalls
//!   responses.
//!
//! Method and event names are opaque `Domain.name` strings; parameter and
//! result bodies are opaque JSON trees. The protocol catalog is not
//! validated here.
//!
//! # Quick Start
//!
//! ```no_run
//! use chrome_cdp::{ChromeOptions, Client, Result};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Launch a browser and connect to it (standalone mode),
//!     // or use .base_url("http://localhost:9222") to attach.
//!     let client = Client::builder()
//!         .launch(ChromeOptions::headless())
//!         .build()?;
//!
//!     client.start().await?;
//!
//!     client.on("Page.loadEventFired", |params| {
//!         println!("page loaded: {params}");
//!     });
//!
//!     client.call("Page.enable", json!({})).await?;
//!     let result = client
//!         .call("Page.navigate", json!({"url": "https://example.com"}))
//!         .await?;
//!     println!("navigated: {result}");
//!
//!     client.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] façade, [`EventRouter`], lifecycle state machine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`launcher`] | Browser process launching and supervision |
//! | [`protocol`] | Wire message types (internal) |
//! | [`transport`] | WebSocket connection and endpoint discovery (internal) |

// ============================================================================
// Modules
// ============================================================================

/// Client façade and event routing.
///
/// Use [`Client::builder()`] to create a configured client instance.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for protocol entities.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Browser process launching and supervision.
///
/// Standalone mode only; attach-mode clients never touch it.
pub mod launcher;

/// Wire message types.
///
/// Internal module defining call/response/event structures.
pub mod protocol;

/// Transport layer.
///
/// Internal module handling the WebSocket connection and HTTP discovery.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{Client, ClientBuilder, ClientStatus, EventHandler, EventRouter, SessionMode};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{CallId, SessionId, TargetId};

// Launcher types
pub use launcher::{ChromeOptions, ChromeService};

// Protocol types
pub use protocol::{Call, Event, Response};

// Transport types
pub use transport::{Connection, Discovery, TargetInfo};
