use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::{JsonRpcVersion, RequestId};

/// Standard and bridge-specific JSON-RPC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonRpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
    ServerError(i64),
    SessionNotFound,
    ProcessCrashed,
    AuthRequired,
    Unauthorized,
    SessionTimeout,
}

impl JsonRpcErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            JsonRpcErrorCode::ParseError => -32700,
            JsonRpcErrorCode::InvalidRequest => -32600,
            JsonRpcErrorCode::MethodNotFound => -32601,
            JsonRpcErrorCode::InvalidParams => -32602,
            JsonRpcErrorCode::InternalError => -32603,
            JsonRpcErrorCode::ServerError(code) => *code,
            JsonRpcErrorCode::SessionNotFound => -32001,
            JsonRpcErrorCode::ProcessCrashed => -32002,
            JsonRpcErrorCode::AuthRequired => -32003,
            JsonRpcErrorCode::Unauthorized => -32004,
            JsonRpcErrorCode::SessionTimeout => -32005,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            JsonRpcErrorCode::ParseError => "Parse error",
            JsonRpcErrorCode::InvalidRequest => "Invalid Request",
            JsonRpcErrorCode::MethodNotFound => "Method not found",
            JsonRpcErrorCode::InvalidParams => "Invalid params",
            JsonRpcErrorCode::InternalError => "Internal error",
            JsonRpcErrorCode::ServerError(_) => "Server error",
            JsonRpcErrorCode::SessionNotFound => "Session not found",
            JsonRpcErrorCode::ProcessCrashed => "Subprocess crashed",
            JsonRpcErrorCode::AuthRequired => "Authentication required",
            JsonRpcErrorCode::Unauthorized => "Unauthorized",
            JsonRpcErrorCode::SessionTimeout => "Session timed out",
        }
    }
}

impl fmt::Display for JsonRpcErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

/// The `error` object of a JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcErrorObject {
    pub fn new(code: JsonRpcErrorCode, message: Option<String>, data: Option<Value>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data,
        }
    }
}

/// A JSON-RPC error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: Option<RequestId>,
    pub error: JsonRpcErrorObject,
}

impl JsonRpcError {
    pub fn new(id: Option<RequestId>, code: JsonRpcErrorCode, message: Option<String>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            error: JsonRpcErrorObject::new(code, message, None),
        }
    }

    pub fn parse_error() -> Self {
        Self::new(None, JsonRpcErrorCode::ParseError, None)
    }

    pub fn invalid_request(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorCode::InvalidRequest, None)
    }

    pub fn session_not_found(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorCode::SessionNotFound, None)
    }

    pub fn process_crashed(id: Option<RequestId>) -> Self {
        Self::new(id, JsonRpcErrorCode::ProcessCrashed, None)
    }

    pub fn internal_error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::new(id, JsonRpcErrorCode::InternalError, Some(message.into()))
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.error.code, self.error.message)
    }
}

impl std::error::Error for JsonRpcError {}

/// Errors raised while decoding a request body into JSON-RPC envelopes.
///
/// These never reach the wire directly; callers map them to a [`JsonRpcError`]
/// or, for a body that isn't even valid JSON, straight to an HTTP 400.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("request body is not valid JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("request does not match the JSON-RPC request/notification/response shape")]
    InvalidRequest,

    #[error("batch must be a non-empty array")]
    EmptyBatch,
}

impl CodecError {
    pub fn as_error_code(&self) -> JsonRpcErrorCode {
        match self {
            CodecError::ParseError(_) => JsonRpcErrorCode::ParseError,
            CodecError::InvalidRequest | CodecError::EmptyBatch => {
                JsonRpcErrorCode::InvalidRequest
            }
        }
    }
}
