//! Type-safe identifiers for protocol entities.
//!
//! Newtype wrappers prevent mixing incompatible IDs at compile time:
//!
//! | Type | Wraps | Purpose |
//! |------|-------|---------|
//! | [`CallId`] | `u64` | Correlates a method call with its response |
//! | [`SessionId`] | `String` | Addresses a target session on a shared connection |
//! | [`TargetId`] | `String` | Identifies a debuggable target (tab) |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ============================================================================
// CallId
// ============================================================================

/// Correlation id for an outgoing method call.
///
/// Every call carries a `u64` id; the matching response echoes it back.
/// Ids are normally assigned by [`CallIdGenerator`]; manually constructed
/// ids are allowed for callers that manage correlation themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    /// Creates a call id from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CallId {
    #[inline]
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// CallIdGenerator
// ============================================================================

/// Seed for generated call ids.
///
/// Seeded well above zero so generated ids never collide with low ids a
/// caller might supply manually. The counter increments before use, so the
/// first generated id is `FIRST_CALL_ID + 1`.
pub(crate) const FIRST_CALL_ID: u64 = 1000;

/// Monotonic generator for [`CallId`]s.
///
/// Ids are unique and strictly increasing for the lifetime of the generator.
#[derive(Debug)]
pub struct CallIdGenerator {
    counter: AtomicU64,
}

impl CallIdGenerator {
    /// Creates a generator seeded at [`FIRST_CALL_ID`].
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(FIRST_CALL_ID),
        }
    }

    /// Returns the next call id.
    #[inline]
    #[must_use]
    pub fn next_id(&self) -> CallId {
        CallId(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl Default for CallIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// CDP session identifier.
///
/// One physical connection can multiplex multiple targets (tabs); messages
/// scoped to a target carry a `sessionId` field. The reserved value
/// [`SessionId::MAIN`] names the default session and serves as the handler
/// lookup fallback in multi-session mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// The reserved default session name.
    pub const MAIN: &'static str = "main";

    /// Creates a session id from a raw string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the reserved default session id.
    #[inline]
    #[must_use]
    pub fn main() -> Self {
        Self(Self::MAIN.to_string())
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this is the reserved default session.
    #[inline]
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.0 == Self::MAIN
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    #[inline]
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    #[inline]
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// TargetId
// ============================================================================

/// Identifier of a debuggable target as reported by the discovery endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Creates a target id from a raw string.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
