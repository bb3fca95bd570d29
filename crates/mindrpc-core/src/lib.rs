//! # mindrpc-core
//!
//! Transport-independent pieces of the MindRPC/2 protocol engine.
//!
//! - **Header codec** ([`headers`]): builds the outgoing header block and
//!   extracts `RpcId`/`IsFinal` from inbound headers
//! - **Message framer** ([`frame`]): `MRPC/2 <headerLen> <bodyLen>\r\n` pre-header
//!   plus header block plus JSON body
//! - **Request registry** ([`registry`]): id allocation and listener dispatch,
//!   including tombstoning of finished or cancelled requests
//! - **Logging** ([`logging`]): subscriber setup and log capture for tests
//!
//! Nothing in this crate performs I/O; the connection manager lives in
//! `mindrpc-client`.

#![deny(unsafe_code)]

pub mod errors;
pub mod frame;
pub mod headers;
pub mod logging;
pub mod registry;
pub mod types;

pub use errors::FrameError;
pub use frame::{IncomingMessage, OutgoingMessage};
pub use headers::{ExtraHeaders, HeaderBlock, StandardHeaders};
pub use registry::{Delivery, RequestRegistry};
pub use types::{Cardinality, MessageType, Response, ResponseListener, RpcId};

/// Schema version sent when neither the configuration nor the caller names one.
pub const DEFAULT_SCHEMA_VERSION: u32 = 22;

/// WebSocket sub-protocol identifier negotiated by MindRPC/2 peers.
pub const SUBPROTOCOL: &str = "com.tivo.mindrpc.2";
