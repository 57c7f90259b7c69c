use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::types::{JsonRpcVersion, RequestId};

/// Parameters for a JSON-RPC request or notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RequestParams {
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
}

impl RequestParams {
    pub fn to_value(&self) -> Value {
        match self {
            RequestParams::Object(map) => {
                Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            RequestParams::Array(arr) => Value::Array(arr.clone()),
        }
    }
}

/// A JSON-RPC request: has both `method` and a non-null `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcRequest {
    pub fn new(id: RequestId, method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            method: method.into(),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_json() {
        let request = JsonRpcRequest::new(RequestId::Number(1), "initialize", None);
        let json = serde_json::to_string(&request).unwrap();
        let parsed: JsonRpcRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, RequestId::Number(1));
        assert_eq!(parsed.method, "initialize");
    }

    #[test]
    fn array_params_survive_round_trip() {
        let request = JsonRpcRequest::new(
            RequestId::String("r1".into()),
            "echo",
            Some(RequestParams::Array(vec![json!("a"), json!(1)])),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["params"], json!(["a", 1]));
    }
}
