//! Header block codec.
//!
//! Outgoing blocks are ordered `Name: value` lines joined by `\r\n`:
//!
//! ```text
//! Type: request
//! RpcId: 7
//! RequestType: bodyConfigSearch      (request / requestUpdate only)
//! ResponseCount: single              (request only)
//! <extra headers with truthy values>
//! <standard headers>
//! <blank line pair>
//! ```
//!
//! Inbound blocks are only scanned for `RpcId` and `IsFinal`; every line is
//! kept verbatim for the listener.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use crate::frame::OutgoingMessage;
use crate::types::RpcId;

/// Line separator used throughout the wire format.
pub const LINE_BREAK: &str = "\r\n";

/// Header/body boundary: the last header line's break plus one empty line.
pub const BLANK_LINE_PAIR: &str = "\r\n\r\n";

const SCHEMA_VERSION: &str = "SchemaVersion";
const BODY_ID: &str = "BodyId";
const FEATURE_AREA: &str = "ApplicationFeatureArea";

const RPC_ID_PREFIX_LEN: usize = "RpcId:".len();
const IS_FINAL_PREFIX_LEN: usize = "IsFinal:".len();

// ─────────────────────────────────────────────────────────────────────────────
// Extra headers
// ─────────────────────────────────────────────────────────────────────────────

/// Caller-supplied headers for one outgoing message, in insertion order.
///
/// Values are JSON values so that falsy entries (`null`, `false`, `0`, `""`)
/// can be recognised and dropped when the block is rendered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtraHeaders(IndexMap<String, Value>);

impl ExtraHeaders {
    /// No extra headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Legacy calling convention: a bare string names the feature area.
    pub fn feature_area(area: impl Into<String>) -> Self {
        Self::new().with(FEATURE_AREA, Value::String(area.into()))
    }

    /// Builder-style [`insert`](Self::insert).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let _ = self.insert(name, value);
        self
    }

    /// Set a header. An existing entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }

    /// Raw value of a header, truthy or not.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Number of entries, including falsy ones.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Fill in `SchemaVersion` and `BodyId` when the caller left them falsy.
    ///
    /// `BodyId` is taken from the body's `bodyId` field, if that is truthy.
    #[must_use]
    pub fn with_defaults(mut self, schema_version: u32, body: Option<&Value>) -> Self {
        if !self.is_set(SCHEMA_VERSION) {
            let _ = self.insert(SCHEMA_VERSION, schema_version);
        }
        if !self.is_set(BODY_ID) {
            if let Some(body_id) = body.and_then(|b| b.get("bodyId")).filter(|v| is_truthy(v)) {
                let _ = self.insert(BODY_ID, body_id.clone());
            }
        }
        self
    }

    /// Rendered `Name: value` lines for the truthy entries.
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.0
            .iter()
            .filter(|(_, value)| is_truthy(value))
            .map(|(name, value)| format!("{name}: {}", render_value(value)))
    }

    fn is_set(&self, name: &str) -> bool {
        self.0.get(name).is_some_and(is_truthy)
    }
}

impl From<&str> for ExtraHeaders {
    fn from(area: &str) -> Self {
        Self::feature_area(area)
    }
}

impl From<String> for ExtraHeaders {
    fn from(area: String) -> Self {
        Self::feature_area(area)
    }
}

impl<K, V> FromIterator<(K, V)> for ExtraHeaders
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Standard headers
// ─────────────────────────────────────────────────────────────────────────────

/// Identification lines appended to every outgoing message, fixed for the
/// lifetime of a connection, plus the connection's default schema version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandardHeaders {
    schema_version: u32,
    lines: Vec<String>,
}

impl StandardHeaders {
    /// Only the content type line. A `schema_version` of 0 means the default.
    pub fn new(schema_version: u32) -> Self {
        let schema_version = if schema_version == 0 {
            crate::DEFAULT_SCHEMA_VERSION
        } else {
            schema_version
        };
        Self {
            schema_version,
            lines: vec!["Content-type: application/json".to_owned()],
        }
    }

    /// Append `name: value` if a non-empty value was configured.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.lines.push(format!("{name}: {value}"));
        }
        self
    }

    /// Schema version injected when a message does not carry one.
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// The configured lines, in order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl Default for StandardHeaders {
    fn default() -> Self {
        Self::new(crate::DEFAULT_SCHEMA_VERSION)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoding
// ─────────────────────────────────────────────────────────────────────────────

/// Build the header block for `message`, ending with [`BLANK_LINE_PAIR`].
pub fn encode_block(message: &OutgoingMessage, standard: &StandardHeaders) -> String {
    let mut lines = vec![
        format!("Type: {}", message.kind),
        format!("RpcId: {}", message.rpc_id),
    ];

    if message.kind.carries_body() {
        match &message.request_type {
            Some(request_type) => lines.push(format!("RequestType: {request_type}")),
            None => warn!(
                rpc_id = message.rpc_id,
                "payload has no string `type`, omitting RequestType"
            ),
        }
        if let Some(cardinality) = message.cardinality {
            lines.push(format!("ResponseCount: {cardinality}"));
        }
    }

    let extra = message
        .extra_headers
        .clone()
        .with_defaults(standard.schema_version(), message.body.as_ref());
    lines.extend(extra.lines());
    lines.extend(standard.lines().iter().cloned());

    // two empty entries so the join ends in a blank line
    lines.push(String::new());
    lines.push(String::new());
    lines.join(LINE_BREAK)
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// The parts of an inbound header block the engine cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Non-empty header lines, verbatim.
    pub lines: Vec<String>,
    /// Value of the `RpcId` line, 0 if absent or unparseable.
    pub rpc_id: RpcId,
    /// Value of the `IsFinal` line, `true` if absent.
    pub is_final: bool,
}

impl HeaderBlock {
    /// Scan a header block (without its trailing blank line pair).
    ///
    /// Later `RpcId`/`IsFinal` lines override earlier ones.
    pub fn parse(text: &str) -> Self {
        let mut rpc_id: RpcId = 0;
        let mut is_final = true;
        let mut lines = Vec::new();

        for line in text.split(LINE_BREAK).filter(|l| !l.is_empty()) {
            let tag = line.split(':').next().unwrap_or_default();
            match tag {
                "RpcId" => {
                    rpc_id = line
                        .get(RPC_ID_PREFIX_LEN..)
                        .and_then(parse_leading_int)
                        .and_then(|n| RpcId::try_from(n).ok())
                        .unwrap_or(0);
                }
                "IsFinal" => {
                    is_final = line
                        .get(IS_FINAL_PREFIX_LEN..)
                        .is_some_and(|v| v.trim() == "true");
                }
                _ => {}
            }
            lines.push(line.to_owned());
        }

        Self {
            lines,
            rpc_id,
            is_final,
        }
    }
}

/// Leading integer of `text` after optional whitespace and sign; trailing
/// garbage is ignored (`" 12abc"` is 12).
fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let n: i64 = digits[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
