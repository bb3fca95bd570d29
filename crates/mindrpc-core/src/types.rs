//! Shared protocol vocabulary: ids, message kinds, cardinality, responses.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Request identifier, unique per live connection. `0` means "no request".
pub type RpcId = u64;

/// Kind of outgoing message, rendered into the `Type:` header line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// A new request (single, multiple, or no response expected).
    Request,
    /// An update to an already issued request.
    RequestUpdate,
    /// Cancellation of an issued request. Never carries a body.
    Cancel,
}

impl MessageType {
    /// Wire spelling of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::RequestUpdate => "requestUpdate",
            Self::Cancel => "cancel",
        }
    }

    /// Whether messages of this type carry a JSON body along with the
    /// `RequestType`/`ResponseCount` lines.
    pub fn carries_body(self) -> bool {
        !matches!(self, Self::Cancel)
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many responses a request expects (`ResponseCount:` header).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cardinality {
    /// Exactly one response.
    Single,
    /// A stream of responses, the last one marked `IsFinal: true`.
    Multiple,
    /// No response at all (fire-and-forget).
    None,
}

impl Cardinality {
    /// Wire spelling of the cardinality.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One response delivered to a [`ResponseListener`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Request the response belongs to.
    pub rpc_id: RpcId,
    /// Parsed JSON body, `None` when the body was not valid JSON.
    pub body: Option<Value>,
    /// Whether this is the last response for the request.
    pub is_final: bool,
    /// Raw `Name: value` header lines as received.
    pub headers: Vec<String>,
}

impl Response {
    /// Value of the first header line named `name`, trimmed.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find_map(|line| {
            let (tag, value) = line.split_once(':')?;
            (tag == name).then(|| value.trim())
        })
    }
}

/// Receives responses for one request id.
///
/// Implemented for every `Fn(Response)` closure, so most callers pass a
/// closure directly.
pub trait ResponseListener: Send + Sync + 'static {
    /// Called once per inbound response for the registered id.
    fn on_response(&self, response: Response);
}

impl<F> ResponseListener for F
where
    F: Fn(Response) + Send + Sync + 'static,
{
    fn on_response(&self, response: Response) {
        self(response);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_type_wire_names() {
        assert_eq!(MessageType::Request.to_string(), "request");
        assert_eq!(MessageType::RequestUpdate.to_string(), "requestUpdate");
        assert_eq!(MessageType::Cancel.to_string(), "cancel");
    }

    #[test]
    fn only_cancel_omits_body() {
        assert!(MessageType::Request.carries_body());
        assert!(MessageType::RequestUpdate.carries_body());
        assert!(!MessageType::Cancel.carries_body());
    }

    #[test]
    fn cardinality_wire_names() {
        assert_eq!(Cardinality::Single.to_string(), "single");
        assert_eq!(Cardinality::Multiple.to_string(), "multiple");
        assert_eq!(Cardinality::None.to_string(), "none");
    }

    #[test]
    fn response_header_lookup() {
        let response = Response {
            rpc_id: 3,
            body: None,
            is_final: true,
            headers: vec!["RpcId: 3".into(), "IsFinal:  true ".into()],
        };
        assert_eq!(response.header("IsFinal"), Some("true"));
        assert_eq!(response.header("RpcId"), Some("3"));
        assert_eq!(response.header("BodyId"), None);
    }

    #[test]
    fn response_serializes_camel_case() {
        let response = Response {
            rpc_id: 1,
            body: Some(json!({"ok": true})),
            is_final: false,
            headers: vec![],
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["rpcId"], 1);
        assert_eq!(value["isFinal"], false);
        assert_eq!(value["body"]["ok"], true);
    }

    #[test]
    fn closures_are_listeners() {
        let (tx, rx) = std::sync::mpsc::channel();
        let listener = move |response: Response| {
            tx.send(response.rpc_id).unwrap();
        };
        listener.on_response(Response {
            rpc_id: 9,
            body: None,
            is_final: true,
            headers: vec![],
        });
        assert_eq!(rx.recv().unwrap(), 9);
    }
}
