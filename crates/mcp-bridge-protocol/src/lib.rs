//! JSON-RPC 2.0 envelope types, batch/single parsing, and SSE wire framing.
//!
//! This crate is transport- and subprocess-agnostic: it only knows how to
//! decode bytes into [`Envelope`]s, classify them, and re-encode a
//! [`sse::SseFrame`] for delivery over `text/event-stream`. It has no opinion
//! about sessions, subprocesses, or HTTP.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod notification;
pub mod request;
pub mod response;
pub mod sse;
pub mod types;

pub use codec::{parse_body, parse_line, parse_value, ParsedBody};
pub use envelope::Envelope;
pub use error::{CodecError, JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use notification::JsonRpcNotification;
pub use request::{JsonRpcRequest, RequestParams};
pub use response::JsonRpcResponse;
pub use sse::{SseFrame, SSE_SOFT_CAP_BYTES};
pub use types::{JsonRpcVersion, RequestId};

pub const JSONRPC_VERSION: &str = "2.0";
