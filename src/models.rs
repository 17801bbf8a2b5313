use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Inbound call envelope. `id` is an opaque correlation token; notifications
/// may omit it entirely.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcSuccess {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcFailure {
    pub jsonrpc: &'static str,
    pub id: Value,
    pub error: JsonRpcError,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// `tools/call` parameters: the tool name plus its named arguments.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: Value,
}

fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}

pub fn success_reply(id: Value, result: Value) -> Value {
    serde_json::to_value(JsonRpcSuccess {
        jsonrpc: "2.0",
        id,
        result,
    })
    .unwrap_or(Value::Null)
}

pub fn error_reply(id: Value, code: i64, message: impl Into<String>) -> Value {
    serde_json::to_value(JsonRpcFailure {
        jsonrpc: "2.0",
        id,
        error: JsonRpcError {
            code,
            message: message.into(),
        },
    })
    .unwrap_or(Value::Null)
}

/// Reply for a request body that was not valid JSON.
pub fn parse_error_reply() -> Value {
    error_reply(Value::Null, -32700, "Parse error")
}
