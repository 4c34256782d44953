//! Error types for the Chrome DevTools Protocol client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use chrome_cdp::{Result, Error};
//!
//! async fn example(client: &chrome_cdp::Client) -> Result<()> {
//!     let result = client.call("Page.navigate", serde_json::json!({"url": "about:blank"})).await?;
//!     println!("{result}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Lifecycle | [`Error::NotStarted`], [`Error::Stopped`] |
//! | Call | [`Error::InvalidArgument`], [`Error::Timeout`], [`Error::Aborted`], [`Error::CallFailed`] |
//! | Transport | [`Error::TransportClosed`], [`Error::Protocol`], [`Error::Discovery`] |
//! | Process | [`Error::ServiceUnavailable`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`], [`Error::Http`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client or launcher configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// Operation requires a started client.
    ///
    /// Returned when `call()` or `stop()` is used before `start()` or after
    /// the client has been stopped.
    #[error("Client is not started")]
    NotStarted,

    /// The client has been stopped and cannot be restarted.
    ///
    /// `Stopped` is a terminal state; create a new client instead.
    #[error("Client has been stopped")]
    Stopped,

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// Invalid argument in call params.
    ///
    /// Protocol parameters are always name-value maps; positional shapes
    /// (arrays, scalars) are rejected before the transport is touched.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// Method call exceeded its wall-clock budget.
    #[error("Calling {method} timed out after {timeout_ms}ms")]
    Timeout {
        /// The method that timed out.
        method: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Shutdown interrupted an in-flight call.
    ///
    /// Returned to every pending caller when `stop()` runs or the transport
    /// dies while calls are outstanding.
    #[error("Aborted while calling {method}")]
    Aborted {
        /// The method whose call was interrupted.
        method: String,
    },

    /// The browser answered with a protocol-level error object.
    #[error("Calling {method} failed: {message} (code {code})")]
    CallFailed {
        /// The method that failed.
        method: String,
        /// Protocol error code.
        code: i64,
        /// Protocol error message.
        message: String,
    },

    /// Protocol violation or unexpected message shape.
    ///
    /// Returned when an inbound frame carries neither an `id` nor a
    /// `method` field and cannot be classified.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// WebSocket connection closed or unusable.
    ///
    /// Set when the pump observes a socket error or EOF.
    #[error("Transport closed")]
    TransportClosed,

    /// Debugger endpoint discovery failed.
    ///
    /// Returned when the HTTP discovery endpoint answers with an unexpected
    /// shape (e.g. no targets, missing `webSocketDebuggerUrl`).
    #[error("Discovery failed: {message}")]
    Discovery {
        /// Description of the discovery failure.
        message: String,
    },

    // ========================================================================
    // Process Errors
    // ========================================================================
    /// Browser process failed to become connectable.
    ///
    /// Carries captured process output when the process exited early.
    #[error("Browser service unavailable: {message}")]
    ServiceUnavailable {
        /// Description of the failure, including captured output if any.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// HTTP error from the discovery endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a call timeout error.
    #[inline]
    pub fn timeout(method: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            method: method.into(),
            timeout_ms,
        }
    }

    /// Creates an aborted-call error.
    #[inline]
    pub fn aborted(method: impl Into<String>) -> Self {
        Self::Aborted {
            method: method.into(),
        }
    }

    /// Creates a call-failed error from a protocol error object.
    #[inline]
    pub fn call_failed(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::CallFailed {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a discovery error.
    #[inline]
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }

    /// Creates a service unavailable error.
    #[inline]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a lifecycle error.
    #[inline]
    #[must_use]
    pub fn is_lifecycle_error(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Stopped)
    }

    /// Returns `true` if this is a transport-level error.
    #[inline]
    #[must_use]
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::TransportClosed | Self::Aborted { .. } | Self::WebSocket(_)
        )
    }

    /// Returns `true` if the browser rejected the call at protocol level.
    #[inline]
    #[must_use]
    pub fn is_call_failed(&self) -> bool {
        matches!(self, Self::CallFailed { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
