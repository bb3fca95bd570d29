//! Whole-message wire encoding and decoding.
//!
//! ```text
//! MRPC/2 <headerLen> <bodyLen>\r\n<header block><body>
//! ```
//!
//! Lengths are UTF-8 byte counts. `headerLen` includes the blank line pair
//! that closes the header block; `bodyLen` is 0 for cancel messages.

use serde_json::Value;
use tracing::warn;

use crate::errors::{FrameError, Result};
use crate::headers::{self, BLANK_LINE_PAIR, ExtraHeaders, HeaderBlock, LINE_BREAK, StandardHeaders};
use crate::types::{Cardinality, MessageType, RpcId};

/// Protocol tag that opens every pre-header.
pub const PROTOCOL_TAG: &str = "MRPC/2";

// ─────────────────────────────────────────────────────────────────────────────
// Outgoing
// ─────────────────────────────────────────────────────────────────────────────

/// A logical message ready to be framed.
#[derive(Clone, Debug, PartialEq)]
pub struct OutgoingMessage {
    /// `Type:` header.
    pub kind: MessageType,
    /// `RpcId:` header.
    pub rpc_id: RpcId,
    /// `RequestType:` header, taken from the payload's `type` field.
    pub request_type: Option<String>,
    /// `ResponseCount:` header; absent for updates and cancels.
    pub cardinality: Option<Cardinality>,
    /// Caller-supplied headers, before defaulting.
    pub extra_headers: ExtraHeaders,
    /// JSON payload; `None` for cancels.
    pub body: Option<Value>,
}

impl OutgoingMessage {
    /// A new request expecting `cardinality` responses.
    pub fn request(
        rpc_id: RpcId,
        payload: Value,
        cardinality: Cardinality,
        extra_headers: ExtraHeaders,
    ) -> Self {
        Self {
            kind: MessageType::Request,
            rpc_id,
            request_type: request_type_of(&payload),
            cardinality: Some(cardinality),
            extra_headers,
            body: Some(payload),
        }
    }

    /// An update against an issued request.
    pub fn update(rpc_id: RpcId, payload: Value, extra_headers: ExtraHeaders) -> Self {
        Self {
            kind: MessageType::RequestUpdate,
            rpc_id,
            request_type: request_type_of(&payload),
            cardinality: None,
            extra_headers,
            body: Some(payload),
        }
    }

    /// A cancellation. Carries no body.
    pub fn cancel(rpc_id: RpcId, extra_headers: ExtraHeaders) -> Self {
        Self {
            kind: MessageType::Cancel,
            rpc_id,
            request_type: None,
            cardinality: None,
            extra_headers,
            body: None,
        }
    }
}

fn request_type_of(payload: &Value) -> Option<String> {
    payload.get("type").and_then(Value::as_str).map(str::to_owned)
}

/// Serialize `message` into its wire text.
pub fn encode(message: &OutgoingMessage, standard: &StandardHeaders) -> String {
    let header = headers::encode_block(message, standard);
    let body = match (&message.body, message.kind.carries_body()) {
        (Some(body), true) => body.to_string(),
        _ => String::new(),
    };
    format!(
        "{PROTOCOL_TAG} {} {}{LINE_BREAK}{header}{body}",
        header.len(),
        body.len()
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Incoming
// ─────────────────────────────────────────────────────────────────────────────

/// A decoded inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Header lines as received.
    pub header_lines: Vec<String>,
    /// `RpcId` header, 0 when absent or unparseable.
    pub rpc_id: RpcId,
    /// `IsFinal` header, `true` when absent.
    pub is_final: bool,
    /// Raw body text.
    pub body: String,
    /// Body length announced by the pre-header.
    pub declared_body_length: usize,
}

impl IncomingMessage {
    /// Parse the body as JSON; failures are logged and yield `None`.
    pub fn parse_body(&self) -> Option<Value> {
        match serde_json::from_str(&self.body) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(rpc_id = self.rpc_id, error = %e, "unparseable JSON body");
                None
            }
        }
    }
}

/// Decode wire text into an [`IncomingMessage`].
///
/// Only a missing or malformed pre-header is an error. A header length that
/// does not end on the blank line pair falls back to the first blank line,
/// and a body length mismatch is only logged.
pub fn decode(text: &str) -> Result<IncomingMessage> {
    let (pre_header, rest) = text
        .split_once(LINE_BREAK)
        .ok_or(FrameError::MissingPreHeader)?;

    let tokens: Vec<&str> = pre_header.split(' ').collect();
    let [tag, header_length, body_length] = tokens.as_slice() else {
        return Err(FrameError::MalformedPreHeader {
            line: pre_header.to_owned(),
        });
    };
    if *tag != PROTOCOL_TAG {
        warn!(tag = %tag, "unexpected protocol tag");
    }
    let header_length = parse_length("header", header_length)?;
    let declared_body_length = parse_length("body", body_length)?;

    let (header, body) = split_header_body(rest, header_length);
    if body.len() != declared_body_length {
        warn!(
            body_length = body.len(),
            declared = declared_body_length,
            "marshalled data mismatch"
        );
    }

    let block = HeaderBlock::parse(header);
    Ok(IncomingMessage {
        header_lines: block.lines,
        rpc_id: block.rpc_id,
        is_final: block.is_final,
        body: body.to_owned(),
        declared_body_length,
    })
}

fn parse_length(field: &'static str, token: &str) -> Result<usize> {
    token.parse().map_err(|_| FrameError::InvalidLength {
        field,
        value: token.to_owned(),
    })
}

/// Split the text after the pre-header into header block and body.
fn split_header_body(rest: &str, header_length: usize) -> (&str, &str) {
    if let Some(header_end) = header_length.checked_sub(BLANK_LINE_PAIR.len()) {
        if rest.get(header_end..header_length) == Some(BLANK_LINE_PAIR) {
            if let (Some(header), Some(body)) = (rest.get(..header_end), rest.get(header_length..)) {
                return (header, body);
            }
        }
    }

    warn!(
        header_length,
        available = rest.len(),
        "header length does not end on a blank line, scanning for boundary"
    );
    match rest.find(BLANK_LINE_PAIR) {
        Some(idx) => (&rest[..idx], &rest[idx + BLANK_LINE_PAIR.len()..]),
        None => (rest, ""),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
