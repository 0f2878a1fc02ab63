//! JSON-RPC request dispatch.
//!
//! A request is routed by method name: protocol methods first, then the tool
//! catalog. Tools are reachable both through `tools/call` and directly under
//! their synthesized names (with `params` as the argument map). Framing
//! failures produce JSON-RPC errors; domain failures stay inside the tool
//! content envelope.

use crate::mcp::factory::ToolFactory;
use crate::mcp::types::{
    ErrorCode, JSONRPC_VERSION, MCP_PROTOCOL_VERSION, RpcError, RpcRequest, RpcResponse,
    ToolCallParams,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, warn};

/// Routes parsed requests to protocol handlers or tools.
pub struct Dispatcher {
    factory: Arc<ToolFactory>,
}

impl Dispatcher {
    pub fn new(factory: Arc<ToolFactory>) -> Self {
        Self { factory }
    }

    /// Handle one raw frame. Returns `None` for notifications.
    pub async fn handle_frame(&self, raw: &str) -> Option<RpcResponse> {
        let request: RpcRequest = match serde_json::from_str(raw) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "failed to parse JSON-RPC frame");
                // The ID cannot be recovered from a malformed frame.
                return Some(RpcResponse::failure(
                    Value::Null,
                    RpcError::new(ErrorCode::ParseError, "invalid JSON frame"),
                ));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(RpcResponse::failure(
                request.id,
                RpcError::new(ErrorCode::InvalidRequest, "unsupported jsonrpc version"),
            ));
        }

        self.dispatch(request).await
    }

    /// Dispatch a parsed request.
    pub async fn dispatch(&self, request: RpcRequest) -> Option<RpcResponse> {
        debug!(method = %request.method, "dispatching request");
        let is_notification = request.is_notification();
        let id = request.id.clone();

        let result = match request.method.as_str() {
            "initialize" => Ok(json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                },
            })),
            "notifications/initialized" | "initialized" => return None,
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.factory.list_tools() })),
            "tools/call" => self.call_tool(request.params).await,
            method => match self.factory.resolve(method) {
                Some(descriptor) => {
                    let descriptor = descriptor.clone();
                    let result = self.factory.call(&descriptor, request.params).await;
                    serde_json::to_value(result)
                        .map_err(|e| RpcError::new(ErrorCode::InternalError, e.to_string()))
                }
                None => {
                    warn!(method = %method, "unknown method");
                    Err(RpcError::new(
                        ErrorCode::MethodNotFound,
                        format!("unknown method {}", method),
                    ))
                }
            },
        };

        if is_notification {
            return None;
        }

        Some(match result {
            Ok(value) => RpcResponse::result(id, value),
            Err(error) => RpcResponse::failure(id, error),
        })
    }

    async fn call_tool(&self, params: Value) -> Result<Value, RpcError> {
        let params: ToolCallParams = serde_json::from_value(params)
            .map_err(|e| RpcError::new(ErrorCode::InvalidParams, e.to_string()))?;

        let descriptor = self
            .factory
            .resolve(&params.name)
            .cloned()
            .ok_or_else(|| {
                RpcError::new(
                    ErrorCode::MethodNotFound,
                    format!("unknown tool {}", params.name),
                )
            })?;

        let result = self.factory.call(&descriptor, params.arguments).await;
        serde_json::to_value(result)
            .map_err(|e| RpcError::new(ErrorCode::InternalError, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionManager, TransactionRegistry};
    use crate::mcp::factory::DEFAULT_SERVER_NAME;
    use crate::tools::PerformanceAnalyzer;

    fn dispatcher() -> Dispatcher {
        let manager = Arc::new(ConnectionManager::new());
        let factory = ToolFactory::new(
            DEFAULT_SERVER_NAME,
            manager,
            Arc::new(TransactionRegistry::new()),
            Arc::new(PerformanceAnalyzer::new()),
            &[],
        );
        Dispatcher::new(Arc::new(factory))
    }

    #[tokio::test]
    async fn test_parse_error_replies_null_id() {
        let d = dispatcher();
        let response = d.handle_frame("{not json").await.unwrap();
        assert_eq!(response.error.as_ref().unwrap().code, -32700);
        assert!(response.id.is_null());
    }

    #[tokio::test]
    async fn test_wrong_version_is_invalid_request() {
        let d = dispatcher();
        let response = d
            .handle_frame(r#"{"jsonrpc":"1.0","id":1,"method":"ping"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let d = dispatcher();
        let response = d
            .handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"no/such"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_initialize() {
        let d = dispatcher();
        let response = d
            .handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn test_notification_gets_no_response() {
        let d = dispatcher();
        let response = d
            .handle_frame(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let d = dispatcher();
        let response = d
            .handle_frame(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
        assert!(tools > 0);
    }

    #[tokio::test]
    async fn test_direct_tool_method_dispatch() {
        let d = dispatcher();
        let response = d
            .handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"list_databases","params":{}}"#)
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(
            result["content"][0]["text"],
            "Available databases:\n\nNo databases configured.\n"
        );
    }

    #[tokio::test]
    async fn test_tools_call_routing() {
        let d = dispatcher();
        let frame = r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"mcp_db_query_mock","arguments":{"query":"SELECT 1"}}}"#;
        let response = d.handle_frame(frame).await.unwrap();
        let result = response.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Mock query executed:"));
    }

    #[tokio::test]
    async fn test_tools_call_missing_params() {
        let d = dispatcher();
        let response = d
            .handle_frame(r#"{"jsonrpc":"2.0","id":4,"method":"tools/call"}"#)
            .await
            .unwrap();
        assert_eq!(response.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_domain_error_stays_in_envelope() {
        let d = dispatcher();
        // Empty pattern is a parameter error: isError envelope, not JSON-RPC error.
        let frame = r#"{"jsonrpc":"2.0","id":5,"method":"mcp_db_filter_table_names_mock","params":{"pattern":""}}"#;
        let response = d.handle_frame(frame).await.unwrap();
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
    }
}
