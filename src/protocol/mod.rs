//! Protocol message types.
//!
//! This module defines the message format exchanged with the browser's
//! debugger endpoint. Method and event names are opaque `Domain.name`
//! strings; parameter and result bodies are opaque JSON trees. The protocol
//! catalog itself is out of scope.
//!
//! # Message Types
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`Call`] | Client → Browser | Method invocation |
//! | [`Response`] | Browser → Client | Call result or error |
//! | [`Event`] | Browser → Client | Unsolicited notification |

// ============================================================================
// Submodules
// ============================================================================

/// Wire message types and inbound classification.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{Call, Event, InboundMessage, Response, ResponseError};
