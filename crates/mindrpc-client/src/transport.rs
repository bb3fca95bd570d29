//! WebSocket plumbing: connecting, the writer task, and inbound message
//! classification.

use std::fmt::Display;

use futures::{Sink, SinkExt};
use mindrpc_core::SUBPROTOCOL;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::{Error as WsError, UrlError};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::errors::MindRpcError;
use crate::hooks::{ABNORMAL_CLOSURE, CloseEvent, NO_STATUS_RECEIVED};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Work item for the writer task.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outbound {
    /// An encoded MindRPC/2 message.
    Frame(String),
    /// Start the closing handshake and stop writing.
    Close,
}

/// Whether this build can open `wss://` URLs.
pub(crate) fn supports_tls() -> bool {
    cfg!(feature = "rustls")
}

/// Open a WebSocket to `url`, offering the MindRPC/2 sub-protocol.
pub(crate) async fn connect(url: &str) -> Result<WsStream, MindRpcError> {
    let mut request =
        url.into_client_request()
            .map_err(|e| MindRpcError::ConstructionFailure {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
    let _ = request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

    let (ws, _response) = connect_async(request)
        .await
        .map_err(|e| classify_connect_error(url, e))?;
    Ok(ws)
}

/// Map a handshake failure onto the establishment error taxonomy.
pub(crate) fn classify_connect_error(url: &str, err: WsError) -> MindRpcError {
    match err {
        WsError::Url(UrlError::TlsFeatureNotEnabled) => MindRpcError::TransportUnsupported {
            scheme: url.split("://").next().unwrap_or("wss").to_owned(),
        },
        WsError::Url(e) => MindRpcError::ConstructionFailure {
            url: url.to_owned(),
            reason: e.to_string(),
        },
        other => MindRpcError::AbnormalClosure {
            code: ABNORMAL_CLOSURE,
            message: other.to_string(),
        },
    }
}

/// Drain `outbound` into the socket until the channel closes, a close is
/// requested, or a write fails.
///
/// A failed frame write is handed to `on_failure`; failing to send the
/// closing frame is only logged.
pub(crate) async fn write_loop<S, F>(
    mut sink: S,
    mut outbound: UnboundedReceiver<Outbound>,
    on_failure: F,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    F: FnOnce(String),
{
    while let Some(item) = outbound.recv().await {
        match item {
            Outbound::Frame(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(error = %e, "websocket write failed");
                    on_failure(format!("websocket write failed: {e}"));
                    break;
                }
            }
            Outbound::Close => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "close frame not sent");
                }
                break;
            }
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "websocket close failed");
    }
}

/// What the reader should do with one item from the socket stream.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Inbound {
    /// A text payload to decode and dispatch.
    Text(String),
    /// The connection is over.
    Closed(CloseEvent),
    /// A read error; the connection is over with an abnormal close.
    Failed(String),
    /// Control frames and anything else with no protocol meaning.
    Ignored,
}

pub(crate) fn classify(next: Option<Result<Message, WsError>>) -> Inbound {
    match next {
        Some(Ok(Message::Text(text))) => Inbound::Text(text.as_str().to_owned()),
        Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
            Ok(text) => Inbound::Text(text),
            Err(_) => {
                warn!(len = data.len(), "dropping non-UTF-8 binary frame");
                Inbound::Ignored
            }
        },
        Some(Ok(Message::Close(frame))) => Inbound::Closed(match frame {
            Some(frame) => CloseEvent::new(u16::from(frame.code), frame.reason.as_str()),
            None => CloseEvent::new(NO_STATUS_RECEIVED, ""),
        }),
        Some(Ok(_)) => Inbound::Ignored,
        Some(Err(e)) => Inbound::Failed(e.to_string()),
        None => Inbound::Closed(CloseEvent::abnormal("connection ended without a close frame")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
