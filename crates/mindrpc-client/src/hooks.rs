//! Connection event hooks.
//!
//! Collaborators implement [`ConnectionHooks`] to observe closures and
//! transport errors. Both methods default to doing nothing.

use std::fmt;

/// WebSocket close code for a connection lost without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Close code reported when the peer's close frame carries no status.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// A connection closed, by the peer or by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseEvent {
    /// WebSocket close code.
    pub code: u16,
    /// Close reason or transport message; may be empty.
    pub reason: String,
}

impl CloseEvent {
    /// Event with an explicit code.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Connection lost without a closing handshake.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason)
    }

    /// Whether this is the abnormal-termination code.
    pub fn is_abnormal(&self) -> bool {
        self.code == ABNORMAL_CLOSURE
    }
}

impl fmt::Display for CloseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "closed with code {}", self.code)
        } else {
            write!(f, "closed with code {}: {}", self.code, self.reason)
        }
    }
}

/// A transport error on the connection or while sending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorEvent {
    /// Human-readable description.
    pub message: String,
}

impl ErrorEvent {
    /// Event carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Receives connection-level events.
///
/// Called from the connection's reader task or from the thread issuing a
/// failed send, never while internal locks are held.
pub trait ConnectionHooks: Send + Sync + 'static {
    /// The connection closed. State has already been reset.
    fn on_closed(&self, _event: &CloseEvent) {}

    /// A transport or send error occurred.
    fn on_error(&self, _event: &ErrorEvent) {}
}

/// Hooks that ignore every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopHooks;

impl ConnectionHooks for NoopHooks {}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
