//! Client façade and event routing.
//!
//! This module provides the public entry point for protocol sessions.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Protocol client: lifecycle, calls, event registration |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientStatus`] | Lifecycle state (`Initial`/`Started`/`Stopped`) |
//! | [`EventRouter`] | Handler table and dispatch loop |
//! | [`SessionMode`] | Handler key scheme (single vs. multi session) |

// ============================================================================
// Submodules
// ============================================================================

/// Client façade and lifecycle state machine.
pub mod core;

/// Event routing and dispatch.
pub mod router;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Client, ClientBuilder, ClientStatus};
pub use router::{EventHandler, EventRouter, SessionMode};
