use serde_json::Value;

use crate::{
    error::CodecError,
    notification::JsonRpcNotification,
    request::JsonRpcRequest,
    response::JsonRpcResponse,
    types::RequestId,
    JsonRpcError,
};

/// One parsed JSON-RPC message, classified by shape.
///
/// A request has `method` and a non-null `id`; a notification has `method`
/// and no `id`; a response has `id` and exactly one of `result`/`error`.
#[derive(Debug, Clone)]
pub enum Envelope {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl Envelope {
    /// Classify and deserialize a single decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, CodecError> {
        let obj = value.as_object().ok_or(CodecError::InvalidRequest)?;

        if obj.contains_key("method") {
            let has_id = obj.get("id").map(|id| !id.is_null()).unwrap_or(false);
            return if has_id {
                serde_json::from_value(value)
                    .map(Envelope::Request)
                    .map_err(|_| CodecError::InvalidRequest)
            } else {
                serde_json::from_value(value)
                    .map(Envelope::Notification)
                    .map_err(|_| CodecError::InvalidRequest)
            };
        }

        let has_result = obj.contains_key("result");
        let has_error = obj.contains_key("error");
        match (has_result, has_error) {
            (true, false) => serde_json::from_value(value)
                .map(Envelope::Response)
                .map_err(|_| CodecError::InvalidRequest),
            (false, true) => serde_json::from_value(value)
                .map(Envelope::Error)
                .map_err(|_| CodecError::InvalidRequest),
            _ => Err(CodecError::InvalidRequest),
        }
    }

    /// `true` for requests awaiting a correlated response (id present and non-null).
    pub fn needs_response(&self) -> bool {
        matches!(self, Envelope::Request(_))
    }

    pub fn is_initialize(&self) -> bool {
        matches!(self, Envelope::Request(r) if r.method == "initialize")
    }

    pub fn is_initialized_notification(&self) -> bool {
        matches!(self, Envelope::Notification(n) if n.method == "notifications/initialized")
    }

    /// `true` when read from a subprocess's stdout, i.e. it carries a correlated answer.
    pub fn is_response(&self) -> bool {
        matches!(self, Envelope::Response(_) | Envelope::Error(_))
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Envelope::Request(r) => Some(&r.id),
            Envelope::Response(r) => Some(&r.id),
            Envelope::Error(e) => e.id.as_ref(),
            Envelope::Notification(_) => None,
        }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Envelope::Request(r) => Some(&r.method),
            Envelope::Notification(n) => Some(&n.method),
            Envelope::Response(_) | Envelope::Error(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Envelope::Request(r) => serde_json::to_value(r),
            Envelope::Notification(n) => serde_json::to_value(n),
            Envelope::Response(r) => serde_json::to_value(r),
            Envelope::Error(e) => serde_json::to_value(e),
        }
        .expect("envelope variants always serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_with_id_classifies_as_request() {
        let env = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": "i1", "method": "initialize"
        }))
        .unwrap();
        assert!(env.needs_response());
        assert!(env.is_initialize());
    }

    #[test]
    fn notification_has_no_id() {
        let env = Envelope::from_value(json!({
            "jsonrpc": "2.0", "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(!env.needs_response());
        assert!(env.is_initialized_notification());
        assert!(env.id().is_none());
    }

    #[test]
    fn response_with_both_result_and_error_is_rejected() {
        let err = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "result": {}, "error": {"code": -1, "message": "x"}
        }));
        assert!(err.is_err());
    }

    #[test]
    fn response_is_classified_as_such() {
        let env = Envelope::from_value(json!({
            "jsonrpc": "2.0", "id": 1, "result": {"ok": true}
        }))
        .unwrap();
        assert!(env.is_response());
        assert_eq!(env.id(), Some(&RequestId::Number(1)));
    }
}
