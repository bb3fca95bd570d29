//! Client error types.

use mindrpc_core::RpcId;
use thiserror::Error;

/// Errors surfaced by [`MindRpc`](crate::MindRpc).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MindRpcError {
    /// The URL scheme needs a transport this build does not include.
    #[error("{scheme}:// transport is not supported by this build")]
    TransportUnsupported {
        /// Scheme that was requested (`wss`).
        scheme: String,
    },

    /// The socket could not be constructed from the configured URL.
    #[error("cannot open {url}: {reason}")]
    ConstructionFailure {
        /// The URL that was rejected.
        url: String,
        /// Why construction failed.
        reason: String,
    },

    /// The connection closed with the abnormal-termination code before
    /// it was established.
    #[error("connection closed abnormally (code {code}): {message}")]
    AbnormalClosure {
        /// WebSocket close code, normally 1006.
        code: u16,
        /// What the transport reported.
        message: String,
    },

    /// A frame could not be queued on the socket.
    #[error("failed to send frame: {reason}")]
    SendFailure {
        /// Why the send failed.
        reason: String,
    },

    /// No connection is currently open.
    #[error("not connected")]
    NotConnected,

    /// The connection was reset before the response arrived.
    #[error("response for request {rpc_id} was dropped")]
    ResponseDropped {
        /// Request that never got its response.
        rpc_id: RpcId,
    },
}

impl MindRpcError {
    /// Numeric rejection code: the negated close code for abnormal
    /// closures, `-1` for everything else.
    pub fn code(&self) -> i32 {
        match self {
            Self::AbnormalClosure { code, .. } => -i32::from(*code),
            _ => -1,
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, MindRpcError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
