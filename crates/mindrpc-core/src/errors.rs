//! Frame decoding errors.

use thiserror::Error;

/// Reasons an inbound wire message could not be decoded at all.
///
/// Softer problems (body length mismatch, unexpected protocol tag,
/// misplaced header boundary) are logged and decoding continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// No `\r\n` terminates the pre-header line.
    #[error("message has no pre-header line")]
    MissingPreHeader,

    /// The pre-header is not `<tag> <headerLen> <bodyLen>`.
    #[error("malformed pre-header: {line:?}")]
    MalformedPreHeader {
        /// The offending pre-header line.
        line: String,
    },

    /// A declared length is not a non-negative integer.
    #[error("invalid {field} length: {value:?}")]
    InvalidLength {
        /// Which length (`header` or `body`).
        field: &'static str,
        /// The token as received.
        value: String,
    },
}

/// Result type for frame decoding.
pub type Result<T> = std::result::Result<T, FrameError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
