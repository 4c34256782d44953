//! Wire message types.
//!
//! Defines the three message shapes observed on a DevTools WebSocket and the
//! classification of inbound frames.
//!
//! # Format
//!
//! | Message | Shape | Direction |
//! |---------|-------|-----------|
//! | [`Call`] | `{id, method, params, sessionId?}` | Client → Browser |
//! | [`Response`] | `{id, result?, error?}` | Browser → Client |
//! | [`Event`] | `{method, params, sessionId?}` | Browser → Client |
//!
//! A call always carries `id`; an event never does. An inbound frame with
//! neither `id` nor `method` is malformed and fails classification.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::{CallId, SessionId};

// ============================================================================
// Call
// ============================================================================

/// A method call from client to browser.
///
/// # Format
///
/// ```json
/// {
///   "id": 1001,
///   "method": "Page.navigate",
///   "params": { "url": "https://example.com" },
///   "sessionId": "9A3C..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Call {
    /// Correlation id. Assigned by the connection before the frame is sent
    /// when the caller did not supply one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CallId>,

    /// Method name in `Domain.method` format. Opaque to this crate.
    pub method: String,

    /// Named parameters. Always a map on the wire, never positional.
    pub params: Value,

    /// Target session, when the call is scoped to one.
    #[serde(rename = "sessionId", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl Call {
    /// Creates a call with no id; the connection assigns one on send.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: None,
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Creates a call with a caller-managed id.
    #[inline]
    #[must_use]
    pub fn with_id(id: CallId, method: impl Into<String>, params: Value) -> Self {
        Self {
            id: Some(id),
            method: method.into(),
            params,
            session_id: None,
        }
    }

    /// Scopes the call to a session.
    #[inline]
    #[must_use]
    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from browser to client.
///
/// Carries exactly one of `result`/`error`.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": 1001, "result": { "frameId": "..." } }
/// ```
///
/// Error:
/// ```json
/// { "id": 1001, "error": { "code": -32601, "message": "..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the call's `id`.
    pub id: CallId,

    /// Result body (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object (if failure).
    #[serde(default)]
    pub error: Option<ResponseError>,
}

impl Response {
    /// Returns `true` if this is an error response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extracts the result body, mapping an error object to
    /// [`Error::CallFailed`].
    ///
    /// The method name is only used for error context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CallFailed`] if the response carried an error.
    pub fn into_result(self, method: &str) -> Result<Value> {
        match self.error {
            Some(error) => Err(Error::call_failed(method, error.code, error.message)),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ============================================================================
// ResponseError
// ============================================================================

/// Protocol-level error object inside a [`Response`].
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseError {
    /// Protocol error code.
    pub code: i64,

    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

// ============================================================================
// Event
// ============================================================================

/// An unsolicited notification from browser to client.
///
/// # Format
///
/// ```json
/// {
///   "method": "Page.loadEventFired",
///   "params": { "timestamp": 1234.5 },
///   "sessionId": "9A3C..."
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Event name in `Domain.eventName` format. Opaque to this crate.
    pub method: String,

    /// Event payload.
    #[serde(default)]
    pub params: Value,

    /// Session the event originated from, when multiplexed.
    #[serde(rename = "sessionId", default)]
    pub session_id: Option<SessionId>,
}

// ============================================================================
// InboundMessage
// ============================================================================

/// A classified inbound frame.
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// A response to an outstanding call (frame carried an `id`).
    Response(Response),

    /// A protocol event (frame carried a `method` but no `id`).
    Event(Event),
}

impl InboundMessage {
    /// Classifies a text frame by the presence of `method` and `id`.
    ///
    /// An event is recognized by `method` without `id`; a response by `id`.
    /// Anything else is malformed.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the frame is not valid JSON
    /// - [`Error::Protocol`] if the frame has neither `id` nor `method`
    pub fn classify(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;

        if value.get("method").is_some() && value.get("id").is_none() {
            let event: Event = serde_json::from_value(value)?;
            return Ok(Self::Event(event));
        }

        if value.get("id").is_some() {
            let response: Response = serde_json::from_value(value)?;
            return Ok(Self::Response(response));
        }

        Err(Error::protocol(format!("unclassifiable message: {text}")))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_call_serialization() {
        let call = Call::with_id(
            CallId::new(1001),
            "Page.navigate",
            json!({"url": "https://example.com"}),
        );
        let value = serde_json::to_value(&call).expect("serialize");

        assert_eq!(value["id"], 1001);
        assert_eq!(value["method"], "Page.navigate");
        assert_eq!(value["params"]["url"], "https://example.com");
        assert!(value.get("sessionId").is_none());
    }

    #[test]
    fn test_call_without_id_omits_field() {
        let call = Call::new("Target.getTargets", json!({}));
        let value = serde_json::to_value(&call).expect("serialize");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_call_in_session_carries_session_id() {
        let call = Call::new("Runtime.enable", json!({})).in_session(SessionId::new("9A3C"));
        let value = serde_json::to_value(&call).expect("serialize");
        assert_eq!(value["sessionId"], "9A3C");
    }

    #[test]
    fn test_classify_response() {
        let msg = InboundMessage::classify(r#"{"id": 1001, "result": {"ok": true}}"#)
            .expect("classify");

        match msg {
            InboundMessage::Response(response) => {
                assert_eq!(response.id, CallId::new(1001));
                assert!(!response.is_error());
            }
            InboundMessage::Event(_) => panic!("expected response"),
        }
    }

    #[test]
    fn test_classify_event() {
        let msg = InboundMessage::classify(
            r#"{"method": "Page.loadEventFired", "params": {"timestamp": 1.5}}"#,
        )
        .expect("classify");

        match msg {
            InboundMessage::Event(event) => {
                assert_eq!(event.method, "Page.loadEventFired");
                assert!(event.session_id.is_none());
            }
            InboundMessage::Response(_) => panic!("expected event"),
        }
    }

    #[test]
    fn test_classify_sessioned_event() {
        let msg = InboundMessage::classify(
            r#"{"method": "Page.loadEventFired", "params": {}, "sessionId": "main"}"#,
        )
        .expect("classify");

        match msg {
            InboundMessage::Event(event) => {
                assert_eq!(event.session_id, Some(SessionId::main()));
            }
            InboundMessage::Response(_) => panic!("expected event"),
        }
    }

    #[test]
    fn test_classify_malformed() {
        let err = InboundMessage::classify(r#"{"neither": "id nor method"}"#).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_classify_invalid_json() {
        let err = InboundMessage::classify("not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_response_into_result_success() {
        let response: Response =
            serde_json::from_str(r#"{"id": 1001, "result": {"value": 42}}"#).expect("parse");
        let result = response.into_result("Runtime.evaluate").expect("success");
        assert_eq!(result["value"], 42);
    }

    #[test]
    fn test_response_into_result_missing_body_is_null() {
        let response: Response = serde_json::from_str(r#"{"id": 1001}"#).expect("parse");
        let result = response.into_result("Browser.close").expect("success");
        assert_eq!(result, Value::Null);
    }

    #[test]
    fn test_response_into_result_error() {
        let response: Response = serde_json::from_str(
            r#"{"id": 1001, "error": {"code": -32601, "message": "method not found"}}"#,
        )
        .expect("parse");

        let err = response.into_result("No.suchMethod").unwrap_err();
        match err {
            Error::CallFailed {
                method,
                code,
                message,
            } => {
                assert_eq!(method, "No.suchMethod");
                assert_eq!(code, -32601);
                assert_eq!(message, "method not found");
            }
            other => panic!("expected CallFailed, got {other}"),
        }
    }
}
