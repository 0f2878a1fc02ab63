//! Wire types for the JSON-RPC 2.0 frames and the MCP tool envelope.
//!
//! Only the shapes this server actually reads or writes are modeled. A
//! request ID may be a string, a number or null; it is carried as a raw
//! [`serde_json::Value`] and echoed back verbatim, which sidesteps a
//! dedicated ID type entirely. Protocol results that are built in one place
//! (initialize, tools/list) are assembled inline with `json!` rather than
//! through structs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version literal stamped on every frame.
pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision this server speaks.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// An inbound JSON-RPC frame. The server never writes requests, so this
/// type only deserializes.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Must be the `"2.0"` literal; checked by the dispatcher.
    #[serde(default)]
    pub jsonrpc: String,
    /// Missing on notifications; deserializes to `Value::Null`.
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl RpcRequest {
    /// Notifications carry no ID and receive no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_null()
    }
}

/// An outbound JSON-RPC frame. Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// The standard JSON-RPC 2.0 error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::InternalError => -32603,
        }
    }
}

/// JSON-RPC error object. Only framing failures produce these; domain
/// failures stay inside the tool envelope.
#[derive(Debug, Clone, Serialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
}

impl RpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i32(),
            message: message.into(),
        }
    }
}

/// A tool as advertised through `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Parameters of a `tools/call` invocation.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One block of tool output. Text is the only kind this server emits, so
/// the discriminator is a plain field rather than an enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl ContentBlock {
    fn of_text(text: String) -> Self {
        Self {
            kind: "text".to_string(),
            text,
        }
    }
}

/// The universal content envelope every tool returns:
/// `{content: [{type, text}], isError?}`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl ToolResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::of_text(text.into())],
            is_error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::of_text(format!("Error: {}", message.into()))],
            is_error: Some(true),
        }
    }
}
