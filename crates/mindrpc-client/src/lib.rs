//! # mindrpc-client
//!
//! Connection manager for the MindRPC/2 protocol over a WebSocket.
//!
//! [`MindRpc`] owns at most one live socket. Requests are framed by
//! `mindrpc-core`, queued to a writer task, and answered through listeners
//! that a reader task dispatches by `RpcId`. Closure and transport errors are
//! surfaced through [`ConnectionHooks`]; the engine never reconnects on its own.
//!
//! ```no_run
//! use mindrpc_client::MindRpc;
//! use mindrpc_core::ExtraHeaders;
//! use mindrpc_settings::MindRpcSettings;
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), mindrpc_client::MindRpcError> {
//! let rpc = MindRpc::new(MindRpcSettings::for_device("tivo.local", 2412));
//! let rpc = rpc.start().await?;
//! let body = rpc.call(json!({"type": "bodyConfigSearch"}), ExtraHeaders::new()).await?;
//! println!("{body}");
//! rpc.stop();
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod calls;
pub mod connection;
pub mod errors;
pub mod hooks;
mod transport;

pub use connection::MindRpc;
pub use errors::{MindRpcError, Result};
pub use hooks::{
    ABNORMAL_CLOSURE, CloseEvent, ConnectionHooks, ErrorEvent, NO_STATUS_RECEIVED, NoopHooks,
};
