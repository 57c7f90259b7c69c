use mcp_bridge_protocol::{JsonRpcError, JsonRpcErrorCode, RequestId};

/// Errors raised while routing a message through the Proxy Core.
///
/// Every variant maps to one of the JSON-RPC extension codes in the bridge's
/// wire contract via [`ProxyError::code`], so callers can turn it directly
/// into a response without re-deriving the mapping.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no server configured for endpoint {0}")]
    EndpointUnknown(String),

    #[error("initialize must not be sent with an existing session id")]
    UnexpectedSessionId,

    #[error("a session id is required for this request")]
    SessionRequired,

    #[error("session not found")]
    SessionNotFound,

    #[error("failed to spawn subprocess: {0}")]
    SpawnFailed(String),

    #[error("maximum session count reached")]
    ResourceExhausted,

    #[error("timed out waiting for a correlated response")]
    UpstreamTimeout,

    #[error("subprocess crashed while a response was in flight")]
    SubprocessCrashed,

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn code(&self) -> JsonRpcErrorCode {
        match self {
            ProxyError::EndpointUnknown(_) => JsonRpcErrorCode::InvalidRequest,
            ProxyError::UnexpectedSessionId | ProxyError::SessionRequired => {
                JsonRpcErrorCode::InvalidRequest
            }
            ProxyError::SessionNotFound => JsonRpcErrorCode::SessionNotFound,
            ProxyError::SpawnFailed(_) => JsonRpcErrorCode::InternalError,
            ProxyError::ResourceExhausted => JsonRpcErrorCode::ServerError(-32000),
            ProxyError::UpstreamTimeout => JsonRpcErrorCode::InternalError,
            ProxyError::SubprocessCrashed => JsonRpcErrorCode::ProcessCrashed,
            ProxyError::Internal(_) => JsonRpcErrorCode::InternalError,
        }
    }

    /// Renders this error as a JSON-RPC error response carrying `id`, per
    /// the propagation policy: parse/invalid-request/timeout/crash errors
    /// all reach the caller as a JSON-RPC envelope, never a bare HTTP error.
    pub fn to_json_rpc_error(&self, id: Option<RequestId>) -> JsonRpcError {
        JsonRpcError::new(id, self.code(), Some(self.to_string()))
    }
}
