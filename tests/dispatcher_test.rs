//! End-to-end dispatch over the JSON-RPC surface.

use multidb_mcp_server::db::{ConnectionManager, TransactionRegistry};
use multidb_mcp_server::mcp::{DEFAULT_SERVER_NAME, Dispatcher, ToolFactory};
use multidb_mcp_server::models::{ConnectionSpec, DatabaseType};
use multidb_mcp_server::tools::PerformanceAnalyzer;
use serde_json::Value;
use std::sync::Arc;

fn empty_dispatcher() -> Dispatcher {
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

async fn sqlite_dispatcher(dir: &tempfile::TempDir) -> Dispatcher {
    let mut spec = ConnectionSpec::new("lite1", DatabaseType::Sqlite);
    spec.database_path = Some(dir.path().join("e2e.db").display().to_string());
    let manager = Arc::new(ConnectionManager::new());
    manager.load_config(vec![spec]).await.unwrap();
    manager.connect().await.unwrap();
    let db_ids = manager.list_databases().await;
    let factory = ToolFactory::new(
        DEFAULT_SERVER_NAME,
        manager,
        Arc::new(TransactionRegistry::new()),
        Arc::new(PerformanceAnalyzer::new()),
        &db_ids,
    );
    Dispatcher::new(Arc::new(factory))
}

fn text_of(response: &Value) -> &str {
    response["content"][0]["text"].as_str().unwrap()
}

// Scenario: list_databases with an empty configuration.
#[tokio::test]
async fn list_databases_empty_config() {
    let d = empty_dispatcher();
    let response = d
        .handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"list_databases","params":{}}"#)
        .await
        .unwrap();
    let result = response.result.unwrap();
    assert_eq!(
        text_of(&result),
        "Available databases:\n\nNo databases configured.\n"
    );
}

// Scenario: a query tool invocation returns header, row, and trailer.
#[tokio::test]
async fn query_tool_row_table() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;
    let frame = r#"{"jsonrpc":"2.0","id":2,"method":"mcp_db_query_lite1","params":{"query":"SELECT 1 AS n"}}"#;
    let response = d.handle_frame(frame).await.unwrap();
    let result = response.result.unwrap();
    let text = text_of(&result);
    assert!(text.starts_with("n\n"), "got: {}", text);
    assert!(text.ends_with("\nTotal rows: 1"), "got: {}", text);
}

#[tokio::test]
async fn execute_then_query_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;

    let create = r#"{"jsonrpc":"2.0","id":1,"method":"mcp_db_execute_lite1","params":{"statement":"CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)"}}"#;
    let response = d.handle_frame(create).await.unwrap();
    assert!(response.error.is_none());

    let insert = r#"{"jsonrpc":"2.0","id":2,"method":"mcp_db_execute_lite1","params":{"statement":"INSERT INTO t (v) VALUES (?)","params":["hello"]}}"#;
    let response = d.handle_frame(insert).await.unwrap();
    let result = response.result.unwrap();
    let text = text_of(&result);
    assert!(text.contains("Rows affected: 1"));
    assert!(text.contains("Last insert ID: 1"));

    let select = r#"{"jsonrpc":"2.0","id":3,"method":"mcp_db_query_lite1","params":{"query":"SELECT v FROM t"}}"#;
    let response = d.handle_frame(select).await.unwrap();
    let result = response.result.unwrap();
    assert!(text_of(&result).contains("hello"));
}

// Scenario: begin, insert, rollback; the row is gone afterwards.
#[tokio::test]
async fn transaction_rollback_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;

    let create = r#"{"jsonrpc":"2.0","id":1,"method":"mcp_db_execute_lite1","params":{"statement":"CREATE TABLE t (id INTEGER)"}}"#;
    d.handle_frame(create).await.unwrap();

    let begin = r#"{"jsonrpc":"2.0","id":2,"method":"mcp_db_transaction_lite1","params":{"action":"begin"}}"#;
    let response = d.handle_frame(begin).await.unwrap();
    let result = response.result.unwrap();
    let text = text_of(&result).to_string();
    let tx_id = text.rsplit(' ').next().unwrap().to_string();
    assert!(tx_id.starts_with("tx_lite1_"));

    let insert = format!(
        r#"{{"jsonrpc":"2.0","id":3,"method":"mcp_db_transaction_lite1","params":{{"action":"execute","transactionId":"{}","statement":"INSERT INTO t (id) VALUES (42)"}}}}"#,
        tx_id
    );
    let response = d.handle_frame(&insert).await.unwrap();
    assert!(response.error.is_none());

    let rollback = format!(
        r#"{{"jsonrpc":"2.0","id":4,"method":"mcp_db_transaction_lite1","params":{{"action":"rollback","transactionId":"{}"}}}}"#,
        tx_id
    );
    let response = d.handle_frame(&rollback).await.unwrap();
    let result = response.result.unwrap();
    assert_eq!(text_of(&result), "Transaction rolled back");

    let count = r#"{"jsonrpc":"2.0","id":5,"method":"mcp_db_query_lite1","params":{"query":"SELECT COUNT(*) AS c FROM t WHERE id=42"}}"#;
    let response = d.handle_frame(count).await.unwrap();
    let result = response.result.unwrap();
    let text = text_of(&result);
    assert!(text.contains("\n0\n"), "expected zero count, got: {}", text);
}

#[tokio::test]
async fn tools_list_contains_stable_synthesized_names() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;
    let response = d
        .handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .await
        .unwrap();
    let tools = response.result.unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();

    for expected in [
        "mcp_db_query_lite1",
        "mcp_db_execute_lite1",
        "mcp_db_transaction_lite1",
        "mcp_db_performance_lite1",
        "mcp_db_schema_lite1",
        "mcp_db_filter_table_names_lite1",
        "mcp_db_list_databases",
    ] {
        assert!(names.contains(&expected), "missing tool {}", expected);
    }

    // Every tool advertises an object schema.
    for tool in &tools {
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[tokio::test]
async fn schema_tool_full_component() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;

    let create = r#"{"jsonrpc":"2.0","id":1,"method":"mcp_db_execute_lite1","params":{"statement":"CREATE TABLE s (id INTEGER)"}}"#;
    d.handle_frame(create).await.unwrap();

    let schema = r#"{"jsonrpc":"2.0","id":2,"method":"mcp_db_schema_lite1","params":{}}"#;
    let response = d.handle_frame(schema).await.unwrap();
    let result = response.result.unwrap();
    let text = text_of(&result);
    assert!(text.contains("\"tables\""));
    assert!(text.contains("\"s\""));
}

#[tokio::test]
async fn filter_tool_returns_sorted_json_array() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;

    for table in ["wp_users", "wp_posts", "WP_Options", "users"] {
        let frame = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"mcp_db_execute_lite1","params":{{"statement":"CREATE TABLE {} (id INTEGER)"}}}}"#,
            table
        );
        d.handle_frame(&frame).await.unwrap();
    }

    let filter = r#"{"jsonrpc":"2.0","id":2,"method":"mcp_db_filter_table_names_lite1","params":{"pattern":"WP_"}}"#;
    let response = d.handle_frame(filter).await.unwrap();
    let result = response.result.unwrap();
    assert_eq!(text_of(&result), r#"["WP_Options","wp_posts","wp_users"]"#);
}

#[tokio::test]
async fn domain_errors_fold_into_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;

    // Bad SQL: driver failure, still a JSON-RPC success.
    let frame = r#"{"jsonrpc":"2.0","id":1,"method":"mcp_db_query_lite1","params":{"query":"SELECT * FROM nope"}}"#;
    let response = d.handle_frame(frame).await.unwrap();
    assert!(response.error.is_none());
    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert!(text_of(&result).starts_with("Error: "));

    // Empty pattern: parameter failure, same treatment.
    let frame = r#"{"jsonrpc":"2.0","id":2,"method":"mcp_db_filter_table_names_lite1","params":{"pattern":""}}"#;
    let response = d.handle_frame(frame).await.unwrap();
    assert!(response.error.is_none());
    assert_eq!(response.result.unwrap()["isError"], true);
}

#[tokio::test]
async fn framing_errors_use_jsonrpc_codes() {
    let d = empty_dispatcher();

    let response = d.handle_frame("{broken").await.unwrap();
    assert_eq!(response.error.unwrap().code, -32700);

    let response = d
        .handle_frame(r#"{"jsonrpc":"2.0","id":1,"method":"ghost_method"}"#)
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);
}

#[tokio::test]
async fn performance_tool_envelope_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let d = sqlite_dispatcher(&dir).await;

    for action in [
        r#"{"action":"getMetrics"}"#,
        r#"{"action":"getSlowQueries"}"#,
        r#"{"action":"analyzeQuery","query":"SELECT * FROM t"}"#,
        r#"{"action":"reset"}"#,
        r#"{"action":"setThreshold","threshold":100}"#,
    ] {
        let frame = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"mcp_db_performance_lite1","params":{}}}"#,
            action
        );
        let response = d.handle_frame(&frame).await.unwrap();
        let result = response.result.unwrap();
        assert!(result.get("isError").is_none(), "action failed: {}", action);
        assert!(!text_of(&result).is_empty());
    }
}
