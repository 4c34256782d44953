//! Transport layer.
//!
//! This module handles communication with the browser's debugger endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Client (Rust)  │       GET /json              │  Browser        │
//! │                 │─────────────────────────────►│                 │
//! │  Discovery      │◄─────────────────────────────│  HTTP debug     │
//! │                 │   webSocketDebuggerUrl       │  server         │
//! │                 │                              │                 │
//! │  Connection     │◄────────────────────────────►│  WebSocket      │
//! │  (pump loop)    │     calls / responses /      │  endpoint       │
//! │                 │     events                   │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Discovery::websocket_url` - Poll the HTTP endpoint for the WebSocket URL
//! 2. `Connection::connect` - Dial the endpoint, spawn the pump loop
//! 3. `Connection::send` - Issue calls, receive correlated responses
//! 4. `Connection::shutdown` + `Connection::join` - Ordered teardown
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket connection and pump loop |
//! | `discovery` | HTTP discovery of the debugger endpoint |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and pump loop.
pub mod connection;

/// HTTP discovery of the debugger endpoint.
pub mod discovery;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::Connection;
pub use discovery::{Discovery, TargetInfo};
