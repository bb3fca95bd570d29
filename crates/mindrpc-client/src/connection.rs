//! Connection manager.
//!
//! A [`MindRpc`] owns at most one socket at a time. Every socket gets a
//! generation number; events from a socket that is no longer current are
//! ignored, so a superseded connection can never reset its successor.
//!
//! Listeners and hooks always run with the state lock released.

use std::fmt;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::StreamExt;
use futures::stream::SplitStream;
use mindrpc_core::frame::{self, OutgoingMessage};
use mindrpc_core::{
    Cardinality, ExtraHeaders, RequestRegistry, ResponseListener, RpcId, StandardHeaders,
};
use mindrpc_settings::MindRpcSettings;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::errors::{MindRpcError, Result};
use crate::hooks::{CloseEvent, ConnectionHooks, ErrorEvent, NoopHooks};
use crate::transport::{self, Inbound, Outbound, WsStream};

/// Handle to one MindRPC/2 engine. Clones share the same connection.
#[derive(Clone)]
pub struct MindRpc {
    inner: Arc<Inner>,
}

struct Inner {
    settings: MindRpcSettings,
    url: String,
    standard: StandardHeaders,
    hooks: Arc<dyn ConnectionHooks>,
    state: Mutex<State>,
    generations: AtomicU64,
}

#[derive(Default)]
struct State {
    socket: Option<Socket>,
    registry: RequestRegistry,
}

struct Socket {
    generation: u64,
    outbound: UnboundedSender<Outbound>,
    _reader: DropGuard,
}

impl Socket {
    fn send(&self, text: String) -> Result<()> {
        self.outbound
            .send(Outbound::Frame(text))
            .map_err(|_| MindRpcError::SendFailure {
                reason: "socket writer has stopped".into(),
            })
    }

    fn close(self) {
        if self.outbound.send(Outbound::Close).is_err() {
            debug!(generation = self.generation, "socket already closed");
        }
    }
}

impl State {
    fn is_current(&self, generation: u64) -> bool {
        self.socket
            .as_ref()
            .is_some_and(|socket| socket.generation == generation)
    }

    /// Detach the socket and forget every request, without notifying anyone.
    fn reset(&mut self) -> Option<Socket> {
        let socket = self.socket.take();
        if socket.is_some() {
            self.registry.clear();
        }
        socket
    }
}

impl MindRpc {
    /// Engine for `settings` with no-op hooks. Nothing connects until
    /// [`start`](Self::start).
    pub fn new(settings: MindRpcSettings) -> Self {
        Self::with_hooks(settings, Arc::new(NoopHooks))
    }

    /// Engine that reports closures and errors to `hooks`.
    pub fn with_hooks(settings: MindRpcSettings, hooks: Arc<dyn ConnectionHooks>) -> Self {
        let url = settings.url();
        let standard = settings.standard_headers();
        Self {
            inner: Arc::new(Inner {
                settings,
                url,
                standard,
                hooks,
                state: Mutex::new(State::default()),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Settings this engine was built with.
    pub fn settings(&self) -> &MindRpcSettings {
        &self.inner.settings
    }

    /// URL the engine connects to.
    pub fn url(&self) -> &str {
        &self.inner.url
    }

    /// Open the connection, replacing any existing one.
    ///
    /// Resolves once the WebSocket handshake completes. A connection lost
    /// during the handshake rejects with [`MindRpcError::AbnormalClosure`]
    /// and is also reported to [`ConnectionHooks::on_closed`].
    pub async fn start(&self) -> Result<MindRpc> {
        self.stop();

        if self.inner.settings.secure && !transport::supports_tls() {
            warn!(url = %self.inner.url, "secure transport requested but not compiled in");
            return Err(MindRpcError::TransportUnsupported {
                scheme: self.inner.settings.scheme().to_owned(),
            });
        }

        debug!(url = %self.inner.url, "connecting");
        let ws = match transport::connect(&self.inner.url).await {
            Ok(ws) => ws,
            Err(e) => {
                error!(url = %self.inner.url, error = %e, "connection failed");
                if let MindRpcError::AbnormalClosure { code, message } = &e {
                    self.inner.hooks.on_closed(&CloseEvent::new(*code, message.clone()));
                }
                return Err(e);
            }
        };

        self.attach(ws);
        info!(url = %self.inner.url, "connected");
        Ok(self.clone())
    }

    fn attach(&self, ws: WsStream) {
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (sink, stream) = ws.split();
        let (outbound, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        // the socket must be current before either task can report an event
        let socket = Socket {
            generation,
            outbound,
            _reader: cancel.clone().drop_guard(),
        };
        let previous = {
            let mut state = self.inner.state.lock();
            let previous = state.reset();
            state.socket = Some(socket);
            previous
        };
        if let Some(previous) = previous {
            previous.close();
        }

        let _ = tokio::spawn(transport::write_loop(
            sink,
            rx,
            write_failure_reporter(Arc::downgrade(&self.inner), generation),
        ));
        let _ = tokio::spawn(read_loop(
            Arc::downgrade(&self.inner),
            generation,
            stream,
            cancel,
        ));
    }

    /// Close the connection and silently drop every pending request.
    ///
    /// No listener and no hook is invoked. Does nothing when not connected.
    pub fn stop(&self) {
        let socket = self.inner.state.lock().reset();
        if let Some(socket) = socket {
            socket.close();
            debug!(url = %self.inner.url, "stopped");
        }
    }

    /// Whether a socket is currently attached.
    pub fn is_connected(&self) -> bool {
        self.inner.state.lock().socket.is_some()
    }

    /// Whether any request still expects a response.
    pub fn is_pending_requests(&self) -> bool {
        self.inner.state.lock().registry.has_pending()
    }

    /// Send a request expecting exactly one response.
    pub fn request<L>(
        &self,
        payload: Value,
        listener: L,
        extra_headers: impl Into<ExtraHeaders>,
    ) -> Result<RpcId>
    where
        L: ResponseListener,
    {
        self.issue(
            payload,
            Some(Arc::new(listener)),
            Cardinality::Single,
            extra_headers.into(),
        )
    }

    /// Send a request whose listener runs for every response until one is
    /// marked final.
    pub fn request_monitoring<L>(
        &self,
        payload: Value,
        listener: L,
        extra_headers: impl Into<ExtraHeaders>,
    ) -> Result<RpcId>
    where
        L: ResponseListener,
    {
        self.issue(
            payload,
            Some(Arc::new(listener)),
            Cardinality::Multiple,
            extra_headers.into(),
        )
    }

    /// Send a request that expects no response. Still consumes an id.
    pub fn fire_and_forget(
        &self,
        payload: Value,
        extra_headers: impl Into<ExtraHeaders>,
    ) -> Result<RpcId> {
        self.issue(payload, None, Cardinality::None, extra_headers.into())
    }

    /// Send an update for `rpc_id`. The registry entry is left untouched.
    pub fn request_update(
        &self,
        rpc_id: RpcId,
        payload: Value,
        extra_headers: impl Into<ExtraHeaders>,
    ) -> Result<()> {
        let message = OutgoingMessage::update(rpc_id, payload, extra_headers.into());
        let text = frame::encode(&message, &self.inner.standard);
        let result = {
            let state = self.inner.state.lock();
            match &state.socket {
                Some(socket) => socket.send(text),
                None => Err(MindRpcError::NotConnected),
            }
        };
        result.map_err(|e| self.report_send_failure(Some(rpc_id), e))
    }

    /// Cancel `rpc_id` and forget its listener.
    ///
    /// Never fails: a cancel that cannot be sent is only logged. Any frame
    /// that still arrives for the id is dropped.
    pub fn cancel_request(&self, rpc_id: RpcId, extra_headers: impl Into<ExtraHeaders>) {
        let message = OutgoingMessage::cancel(rpc_id, extra_headers.into());
        let text = frame::encode(&message, &self.inner.standard);
        let mut state = self.inner.state.lock();
        let sent = match &state.socket {
            Some(socket) => socket.send(text),
            None => Err(MindRpcError::NotConnected),
        };
        if let Err(e) = sent {
            warn!(rpc_id, error = %e, "cancel not sent");
        }
        state.registry.tombstone(rpc_id);
    }

    fn issue(
        &self,
        payload: Value,
        listener: Option<Arc<dyn ResponseListener>>,
        cardinality: Cardinality,
        extra_headers: ExtraHeaders,
    ) -> Result<RpcId> {
        let (rpc_id, result) = {
            let mut state = self.inner.state.lock();
            if state.socket.is_none() {
                drop(state);
                return Err(self.report_send_failure(None, MindRpcError::NotConnected));
            }
            let rpc_id = state.registry.allocate_id();
            if let Some(listener) = listener {
                state.registry.register(rpc_id, listener);
            }
            let message = OutgoingMessage::request(rpc_id, payload, cardinality, extra_headers);
            let text = frame::encode(&message, &self.inner.standard);
            let result = match &state.socket {
                Some(socket) => socket.send(text),
                None => Err(MindRpcError::NotConnected),
            };
            if result.is_err() {
                state.registry.tombstone(rpc_id);
            }
            (rpc_id, result)
        };
        match result {
            Ok(()) => {
                debug!(rpc_id, %cardinality, "request issued");
                Ok(rpc_id)
            }
            Err(e) => Err(self.report_send_failure(Some(rpc_id), e)),
        }
    }

    /// Log a failed data-bearing send and pass it to the error hook.
    fn report_send_failure(&self, rpc_id: Option<RpcId>, err: MindRpcError) -> MindRpcError {
        if err == MindRpcError::NotConnected {
            warn!(?rpc_id, "not connected, nothing sent");
        } else {
            error!(?rpc_id, error = %err, "send failed");
        }
        self.inner.hooks.on_error(&ErrorEvent::new(err.to_string()));
        err
    }
}

impl fmt::Debug for MindRpc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MindRpc")
            .field("url", &self.inner.url)
            .field(
                "generation",
                &state.socket.as_ref().map(|socket| socket.generation),
            )
            .field("registry", &state.registry)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Inbound events
// ─────────────────────────────────────────────────────────────────────────────

impl Inner {
    fn handle_frame(&self, generation: u64, text: &str) {
        let message = match frame::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "dropping undecodable frame");
                return;
            }
        };
        let delivery = {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            state.registry.route(message)
        };
        if let Some(delivery) = delivery {
            delivery.deliver();
        }
    }

    fn handle_error(&self, generation: u64, message: String) {
        if !self.state.lock().is_current(generation) {
            return;
        }
        warn!(url = %self.url, error = %message, "connection error");
        self.hooks.on_error(&ErrorEvent::new(message));
    }

    fn handle_close(&self, generation: u64, event: &CloseEvent) {
        {
            let mut state = self.state.lock();
            if !state.is_current(generation) {
                return;
            }
            let _ = state.reset();
        }
        if event.is_abnormal() {
            warn!(url = %self.url, reason = %event.reason, "connection lost");
        } else {
            info!(url = %self.url, code = event.code, "connection closed");
        }
        self.hooks.on_closed(event);
    }
}

/// Route a writer failure on socket `generation` to the error hook.
fn write_failure_reporter(inner: Weak<Inner>, generation: u64) -> impl FnOnce(String) + Send {
    move |message| {
        if let Some(inner) = inner.upgrade() {
            inner.handle_error(generation, message);
        }
    }
}

async fn read_loop(
    inner: Weak<Inner>,
    generation: u64,
    mut stream: SplitStream<WsStream>,
    cancel: CancellationToken,
) {
    let event = loop {
        let next = tokio::select! {
            () = cancel.cancelled() => return,
            next = stream.next() => next,
        };
        match transport::classify(next) {
            Inbound::Text(text) => {
                let Some(inner) = inner.upgrade() else { return };
                inner.handle_frame(generation, &text);
            }
            Inbound::Ignored => {}
            Inbound::Closed(event) => break event,
            Inbound::Failed(message) => {
                if let Some(inner) = inner.upgrade() {
                    inner.handle_error(generation, message.clone());
                }
                break CloseEvent::abnormal(message);
            }
        }
    };
    if let Some(inner) = inner.upgrade() {
        inner.handle_close(generation, &event);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
impl MindRpc {
    /// Attach a socket backed only by a channel, returning the writer side.
    pub(crate) fn attach_test_socket(&self) -> (u64, mpsc::UnboundedReceiver<Outbound>) {
        let generation = self.inner.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let (outbound, rx) = mpsc::unbounded_channel();
        let socket = Socket {
            generation,
            outbound,
            _reader: CancellationToken::new().drop_guard(),
        };
        if let Some(previous) = self.inner.state.lock().reset() {
            previous.close();
        }
        self.inner.state.lock().socket = Some(socket);
        (generation, rx)
    }

    /// Feed wire text as if it arrived on socket `generation`.
    pub(crate) fn inject_frame(&self, generation: u64, text: &str) {
        self.inner.handle_frame(generation, text);
    }
}
