use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{JsonRpcVersion, RequestId};

/// A successful JSON-RPC response: has `result`, not `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub id: RequestId,
    pub result: Value,
}

impl JsonRpcResponse {
    pub fn new(id: RequestId, result: Value) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            id,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_result_field() {
        let response = JsonRpcResponse::new(RequestId::Number(1), json!({"ok": true}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["result"]["ok"], json!(true));
        assert!(value.get("error").is_none());
    }
}
