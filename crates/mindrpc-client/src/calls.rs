//! Async wrappers over the listener API.

use mindrpc_core::{ExtraHeaders, Response, RpcId};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::connection::MindRpc;
use crate::errors::{MindRpcError, Result};

impl MindRpc {
    /// Send a single-response request and wait for the response body.
    ///
    /// An unparseable body resolves to [`Value::Null`]. If the connection
    /// is stopped or lost first, fails with
    /// [`ResponseDropped`](MindRpcError::ResponseDropped).
    pub async fn call(&self, payload: Value, extra_headers: impl Into<ExtraHeaders>) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        let slot = Mutex::new(Some(tx));
        let rpc_id = self.request(
            payload,
            move |response: Response| {
                if let Some(tx) = slot.lock().take() {
                    let _ = tx.send(response.body.unwrap_or(Value::Null));
                }
            },
            extra_headers,
        )?;
        rx.await.map_err(|_| MindRpcError::ResponseDropped { rpc_id })
    }

    /// Send a monitoring request and stream its responses.
    ///
    /// The receiver ends after the final response, after
    /// [`cancel_request`](Self::cancel_request), or when the connection resets.
    pub fn monitor(
        &self,
        payload: Value,
        extra_headers: impl Into<ExtraHeaders>,
    ) -> Result<(RpcId, mpsc::UnboundedReceiver<Response>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let rpc_id = self.request_monitoring(
            payload,
            move |response: Response| {
                let _ = tx.send(response);
            },
            extra_headers,
        )?;
        Ok((rpc_id, rx))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mindrpc_settings::MindRpcSettings;
    use serde_json::json;

    fn response_text(rpc_id: RpcId, is_final: bool, body: &str) -> String {
        let header = format!("RpcId: {rpc_id}\r\nIsFinal: {is_final}\r\n\r\n");
        format!("MRPC/2 {} {}\r\n{header}{body}", header.len(), body.len())
    }

    #[tokio::test]
    async fn call_resolves_with_body() {
        let rpc = MindRpc::new(MindRpcSettings::default());
        let (generation, _rx) = rpc.attach_test_socket();

        let pending = rpc.call(json!({"type": "echo"}), ExtraHeaders::new());
        let responder = rpc.clone();
        let (body, ()) = tokio::join!(pending, async move {
            tokio::task::yield_now().await;
            responder.inject_frame(generation, &response_text(1, true, r#"{"n":7}"#));
        });
        assert_eq!(body, Ok(json!({"n": 7})));
    }

    #[tokio::test]
    async fn call_with_bad_json_resolves_null() {
        let rpc = MindRpc::new(MindRpcSettings::default());
        let (generation, _rx) = rpc.attach_test_socket();

        let pending = rpc.call(json!({"type": "echo"}), ExtraHeaders::new());
        let responder = rpc.clone();
        let (body, ()) = tokio::join!(pending, async move {
            tokio::task::yield_now().await;
            responder.inject_frame(generation, &response_text(1, true, "<html>"));
        });
        assert_eq!(body, Ok(Value::Null));
    }

    #[tokio::test]
    async fn call_fails_when_connection_stops() {
        let rpc = MindRpc::new(MindRpcSettings::default());
        let (_generation, _rx) = rpc.attach_test_socket();

        let pending = rpc.call(json!({"type": "echo"}), ExtraHeaders::new());
        let stopper = rpc.clone();
        let (result, ()) = tokio::join!(pending, async move {
            tokio::task::yield_now().await;
            stopper.stop();
        });
        assert_matches!(result, Err(MindRpcError::ResponseDropped { rpc_id: 1 }));
    }

    #[tokio::test]
    async fn call_without_connection_fails_fast() {
        let rpc = MindRpc::new(MindRpcSettings::default());
        let result = rpc.call(json!({"type": "echo"}), ExtraHeaders::new()).await;
        assert_eq!(result, Err(MindRpcError::NotConnected));
    }

    #[tokio::test]
    async fn monitor_stream_ends_after_final() {
        let rpc = MindRpc::new(MindRpcSettings::default());
        let (generation, _rx) = rpc.attach_test_socket();

        let (id, mut responses) = rpc.monitor(json!({"type": "watch"}), ExtraHeaders::new()).unwrap();
        for (n, is_final) in [(1, false), (2, false), (3, true)] {
            rpc.inject_frame(generation, &response_text(id, is_final, &format!(r#"{{"n":{n}}}"#)));
        }

        let mut bodies = Vec::new();
        while let Some(response) = responses.recv().await {
            bodies.push(response.body);
        }
        assert_eq!(bodies, [Some(json!({"n": 1})), Some(json!({"n": 2})), Some(json!({"n": 3}))]);
    }

    #[tokio::test]
    async fn monitor_stream_ends_on_cancel() {
        let rpc = MindRpc::new(MindRpcSettings::default());
        let (generation, _rx) = rpc.attach_test_socket();

        let (id, mut responses) = rpc.monitor(json!({"type": "watch"}), ExtraHeaders::new()).unwrap();
        rpc.inject_frame(generation, &response_text(id, false, "{}"));
        rpc.cancel_request(id, ExtraHeaders::new());
        rpc.inject_frame(generation, &response_text(id, false, "{}"));

        assert!(responses.recv().await.is_some());
        assert!(responses.recv().await.is_none());
    }
}
