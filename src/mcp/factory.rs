//! Tool factory and dispatch.
//!
//! At startup the factory materializes one descriptor per tool kind per
//! configured database, named `mcp_<serverName>_<kind>_<dbID>`, plus the
//! global `list_databases` and directory-listing tools. With no databases
//! configured a stub catalog for the pseudo-database `mock` is installed so
//! clients still see the tool surface.
//!
//! Arguments are validated against typed records (unknown fields rejected)
//! before the use-case runs. Domain failures fold into the content envelope
//! with `isError`; they never become JSON-RPC errors.

use crate::db::{ConnectionManager, TransactionRegistry};
use crate::error::{DbError, DbResult};
use crate::mcp::types::{Tool, ToolResult};
use crate::models::QueryParam;
use crate::tools::{
    PerformanceAnalyzer, QueryTools, SchemaComponent, SchemaTools, TransactionTools, list,
};
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default tool-name prefix when `MCP_SERVER_NAME` is unset.
pub const DEFAULT_SERVER_NAME: &str = "db";

/// Database ID used for the stub catalog.
const MOCK_DB_ID: &str = "mock";

/// The abstract operation class of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Query,
    Execute,
    Transaction,
    Performance,
    Schema,
    FilterTableNames,
    ListDatabases,
    ListDirectory,
}

impl ToolKind {
    /// The kinds materialized once per database.
    const PER_DATABASE: [ToolKind; 6] = [
        ToolKind::Query,
        ToolKind::Execute,
        ToolKind::Transaction,
        ToolKind::Performance,
        ToolKind::Schema,
        ToolKind::FilterTableNames,
    ];

    fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Query => "query",
            ToolKind::Execute => "execute",
            ToolKind::Transaction => "transaction",
            ToolKind::Performance => "performance",
            ToolKind::Schema => "schema",
            ToolKind::FilterTableNames => "filter_table_names",
            ToolKind::ListDatabases => "list_databases",
            ToolKind::ListDirectory => "list",
        }
    }
}

/// A registered tool: synthesized name, schema, and its database binding.
#[derive(Debug, Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub kind: ToolKind,
    pub db_id: String,
    pub description: String,
    pub input_schema: JsonValue,
}

/// Factory plus dispatcher for the tool catalog.
pub struct ToolFactory {
    server_name: String,
    descriptors: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    query_tools: QueryTools,
    transaction_tools: TransactionTools,
    schema_tools: SchemaTools,
    analyzer: Arc<PerformanceAnalyzer>,
    manager: Arc<ConnectionManager>,
}

impl ToolFactory {
    /// Build the catalog for the given database IDs.
    pub fn new(
        server_name: impl Into<String>,
        manager: Arc<ConnectionManager>,
        registry: Arc<TransactionRegistry>,
        analyzer: Arc<PerformanceAnalyzer>,
        db_ids: &[String],
    ) -> Self {
        let server_name = server_name.into();
        let mut descriptors = Vec::new();

        if db_ids.is_empty() {
            info!("no databases configured, registering mock tools");
            for kind in ToolKind::PER_DATABASE {
                descriptors.push(make_descriptor(&server_name, kind, MOCK_DB_ID));
            }
        } else {
            for db_id in db_ids {
                for kind in ToolKind::PER_DATABASE {
                    descriptors.push(make_descriptor(&server_name, kind, db_id));
                }
                info!(db_id = %db_id, "registered database tools");
            }
        }

        descriptors.push(ToolDescriptor {
            name: format!("mcp_{}_list_databases", server_name),
            kind: ToolKind::ListDatabases,
            db_id: String::new(),
            description: "List all available database connections".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "random_string": {
                        "type": "string",
                        "description": "Dummy parameter (optional)"
                    }
                }
            }),
        });
        descriptors.push(ToolDescriptor {
            name: format!("mcp_{}_list", server_name),
            kind: ToolKind::ListDirectory,
            db_id: String::new(),
            description: "List files and directories in a given path".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Absolute path to list"
                    }
                },
                "required": ["path"]
            }),
        });

        let index = descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();

        Self {
            server_name,
            descriptors,
            index,
            query_tools: QueryTools::new(manager.clone(), analyzer.clone()),
            transaction_tools: TransactionTools::new(
                manager.clone(),
                registry,
                analyzer.clone(),
            ),
            schema_tools: SchemaTools::new(manager.clone()),
            analyzer,
            manager,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Tool list in registration order; stable for a given config.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.descriptors
            .iter()
            .map(|d| Tool {
                name: d.name.clone(),
                description: d.description.clone(),
                input_schema: d.input_schema.clone(),
            })
            .collect()
    }

    /// Resolve a method name to a descriptor. The global list tool is also
    /// reachable under its bare name.
    pub fn resolve(&self, method: &str) -> Option<&ToolDescriptor> {
        if let Some(&i) = self.index.get(method) {
            return Some(&self.descriptors[i]);
        }
        if method == "list_databases" {
            let name = format!("mcp_{}_list_databases", self.server_name);
            return self.index.get(&name).map(|&i| &self.descriptors[i]);
        }
        None
    }

    /// Validate arguments and run the tool, folding failures into the
    /// content envelope.
    pub async fn call(&self, descriptor: &ToolDescriptor, arguments: JsonValue) -> ToolResult {
        debug!(tool = %descriptor.name, "invoking tool");
        let result = match descriptor.kind {
            ToolKind::Query => self.handle_query(descriptor, arguments).await,
            ToolKind::Execute => self.handle_execute(descriptor, arguments).await,
            ToolKind::Transaction => self.handle_transaction(descriptor, arguments).await,
            ToolKind::Performance => self.handle_performance(descriptor, arguments).await,
            ToolKind::Schema => self.handle_schema(descriptor, arguments).await,
            ToolKind::FilterTableNames => self.handle_filter(descriptor, arguments).await,
            ToolKind::ListDatabases => self.handle_list_databases().await,
            ToolKind::ListDirectory => self.handle_list_directory(arguments),
        };

        match result {
            Ok(text) => ToolResult::text(text),
            Err(e) => ToolResult::error(e.to_string()),
        }
    }

    async fn handle_query(
        &self,
        descriptor: &ToolDescriptor,
        arguments: JsonValue,
    ) -> DbResult<String> {
        let args: QueryArgs = parse_args(arguments)?;
        if descriptor.db_id == MOCK_DB_ID {
            return Ok(format!(
                "Mock query executed:\n{}\n\nThis is a mock response.",
                args.query
            ));
        }
        let params = QueryParam::from_json_array(&args.params);
        self.query_tools
            .execute_query(
                &descriptor.db_id,
                &args.query,
                &params,
                millis(args.timeout),
            )
            .await
    }

    async fn handle_execute(
        &self,
        descriptor: &ToolDescriptor,
        arguments: JsonValue,
    ) -> DbResult<String> {
        let args: ExecuteArgs = parse_args(arguments)?;
        if descriptor.db_id == MOCK_DB_ID {
            return Ok(format!(
                "Mock statement executed:\n{}\n\nThis is a mock response.",
                args.statement
            ));
        }
        let params = QueryParam::from_json_array(&args.params);
        self.query_tools
            .execute_statement(
                &descriptor.db_id,
                &args.statement,
                &params,
                millis(args.timeout),
            )
            .await
    }

    async fn handle_transaction(
        &self,
        descriptor: &ToolDescriptor,
        arguments: JsonValue,
    ) -> DbResult<String> {
        let args: TransactionArgs = parse_args(arguments)?;

        if descriptor.db_id == MOCK_DB_ID {
            return Ok(match args.action {
                TxAction::Begin => {
                    "Transaction started\nTransaction ID: tx_mock_0".to_string()
                }
                TxAction::Commit => "Transaction committed".to_string(),
                TxAction::Rollback => "Transaction rolled back".to_string(),
                TxAction::Execute => "Statement executed in transaction".to_string(),
            });
        }

        match args.action {
            TxAction::Begin => {
                let tx_id = self
                    .transaction_tools
                    .begin(&descriptor.db_id, args.read_only, millis(args.timeout))
                    .await?;
                Ok(format!("Transaction started\nTransaction ID: {}", tx_id))
            }
            TxAction::Commit => {
                let tx_id = require_tx_id(&args, "commit")?;
                self.transaction_tools.commit(&tx_id).await
            }
            TxAction::Rollback => {
                let tx_id = require_tx_id(&args, "rollback")?;
                self.transaction_tools.rollback(&tx_id).await
            }
            TxAction::Execute => {
                let tx_id = require_tx_id(&args, "execute")?;
                let statement = args
                    .statement
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        DbError::parameter("statement is required for execute action")
                    })?;
                let params = QueryParam::from_json_array(&args.params);
                self.transaction_tools
                    .execute(&tx_id, statement, &params, millis(args.timeout))
                    .await
            }
        }
    }

    async fn handle_performance(
        &self,
        descriptor: &ToolDescriptor,
        arguments: JsonValue,
    ) -> DbResult<String> {
        let args: PerformanceArgs = parse_args(arguments)?;
        let limit = args.limit.unwrap_or(10.0).max(0.0) as usize;

        match args.action {
            PerfAction::GetSlowQueries => {
                let slow = self.analyzer.slow_queries(&descriptor.db_id, limit);
                serde_json::to_string_pretty(&slow)
                    .map_err(|e| DbError::internal(e.to_string()))
            }
            PerfAction::GetMetrics => {
                let metrics = self.analyzer.metrics(&descriptor.db_id);
                serde_json::to_string_pretty(&metrics)
                    .map_err(|e| DbError::internal(e.to_string()))
            }
            PerfAction::AnalyzeQuery => {
                let query = args.query.as_deref().filter(|q| !q.is_empty()).ok_or_else(
                    || DbError::parameter("query is required for analyzeQuery action"),
                )?;
                let advice = self.analyzer.analyze(query);
                Ok(format!(
                    "Query analysis for database '{}':\n\n{}",
                    descriptor.db_id,
                    advice
                        .iter()
                        .map(|a| format!("- {}", a))
                        .collect::<Vec<_>>()
                        .join("\n")
                ))
            }
            PerfAction::Reset => {
                self.analyzer.reset(&descriptor.db_id);
                Ok(format!(
                    "Performance metrics reset for database '{}'",
                    descriptor.db_id
                ))
            }
            PerfAction::SetThreshold => {
                let threshold = args.threshold.ok_or_else(|| {
                    DbError::parameter("threshold is required for setThreshold action")
                })?;
                let effective = self.analyzer.set_threshold(threshold.max(0.0) as u64);
                Ok(format!("Slow query threshold set to {} ms", effective))
            }
        }
    }

    async fn handle_schema(
        &self,
        descriptor: &ToolDescriptor,
        arguments: JsonValue,
    ) -> DbResult<String> {
        let args: SchemaArgs = parse_args(arguments)?;
        if descriptor.db_id == MOCK_DB_ID {
            return Ok("Mock schema for database 'mock':\n\n{}".to_string());
        }
        let component = args.component.unwrap_or(SchemaComponent::Full);
        let value = self
            .schema_tools
            .introspect(
                &descriptor.db_id,
                component,
                args.table.as_deref(),
                millis(args.timeout),
            )
            .await?;
        serde_json::to_string_pretty(&value).map_err(|e| DbError::internal(e.to_string()))
    }

    async fn handle_filter(
        &self,
        descriptor: &ToolDescriptor,
        arguments: JsonValue,
    ) -> DbResult<String> {
        let args: FilterArgs = parse_args(arguments)?;
        if args.pattern.is_empty() {
            return Err(DbError::parameter("pattern parameter is required"));
        }
        if descriptor.db_id == MOCK_DB_ID {
            return Ok("[]".to_string());
        }
        let names = self
            .schema_tools
            .filter_table_names(&descriptor.db_id, &args.pattern, None)
            .await?;
        serde_json::to_string(&names).map_err(|e| DbError::internal(e.to_string()))
    }

    async fn handle_list_databases(&self) -> DbResult<String> {
        let ids = self.manager.list_databases().await;
        let mut output = String::from("Available databases:\n\n");
        for (i, id) in ids.iter().enumerate() {
            output.push_str(&format!("{}. {}\n", i + 1, id));
        }
        if ids.is_empty() {
            output.push_str("No databases configured.\n");
        }
        Ok(output)
    }

    fn handle_list_directory(&self, arguments: JsonValue) -> DbResult<String> {
        let args: ListDirectoryArgs = parse_args(arguments)?;
        list::list_directory(&args.path)
    }
}

fn make_descriptor(server_name: &str, kind: ToolKind, db_id: &str) -> ToolDescriptor {
    let name = format!("mcp_{}_{}_{}", server_name, kind.as_str(), db_id);
    let (description, input_schema) = match kind {
        ToolKind::Query => (
            format!("Execute SQL query on {} database", db_id),
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "SQL query to execute"},
                    "params": {
                        "type": "array",
                        "description": "Query parameters",
                        "items": {"type": "string"}
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Query timeout in milliseconds"
                    }
                },
                "required": ["query"]
            }),
        ),
        ToolKind::Execute => (
            format!("Execute SQL statement on {} database", db_id),
            json!({
                "type": "object",
                "properties": {
                    "statement": {"type": "string", "description": "SQL statement to execute"},
                    "params": {
                        "type": "array",
                        "description": "Statement parameters",
                        "items": {"type": "string"}
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Statement timeout in milliseconds"
                    }
                },
                "required": ["statement"]
            }),
        ),
        ToolKind::Transaction => (
            format!("Manage transactions on {} database", db_id),
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "description": "Transaction action (begin, commit, rollback, execute)",
                        "enum": ["begin", "commit", "rollback", "execute"]
                    },
                    "transactionId": {
                        "type": "string",
                        "description": "Transaction ID (required for commit, rollback, execute)"
                    },
                    "statement": {
                        "type": "string",
                        "description": "SQL statement to execute within transaction (required for execute)"
                    },
                    "params": {
                        "type": "array",
                        "description": "Statement parameters",
                        "items": {"type": "string"}
                    },
                    "readOnly": {
                        "type": "boolean",
                        "description": "Whether the transaction is read-only (for begin)"
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Timeout in milliseconds"
                    }
                },
                "required": ["action"]
            }),
        ),
        ToolKind::Performance => (
            format!("Analyze query performance on {} database", db_id),
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "description": "Action (getSlowQueries, getMetrics, analyzeQuery, reset, setThreshold)",
                        "enum": ["getSlowQueries", "getMetrics", "analyzeQuery", "reset", "setThreshold"]
                    },
                    "query": {
                        "type": "string",
                        "description": "SQL query to analyze (required for analyzeQuery)"
                    },
                    "threshold": {
                        "type": "number",
                        "description": "Slow query threshold in milliseconds (required for setThreshold)"
                    },
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of results to return"
                    }
                },
                "required": ["action"]
            }),
        ),
        ToolKind::Schema => (
            format!("Get schema of {} database", db_id),
            json!({
                "type": "object",
                "properties": {
                    "component": {
                        "type": "string",
                        "description": "Schema component to explore (tables, columns, relationships, or full)",
                        "enum": ["tables", "columns", "relationships", "full"]
                    },
                    "table": {
                        "type": "string",
                        "description": "Table name (required when component is columns)"
                    },
                    "timeout": {
                        "type": "integer",
                        "description": "Query timeout in milliseconds"
                    }
                }
            }),
        ),
        ToolKind::FilterTableNames => (
            format!("Filter table names by pattern on {} database", db_id),
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Case-insensitive substring to match against table names"
                    }
                },
                "required": ["pattern"]
            }),
        ),
        ToolKind::ListDatabases | ToolKind::ListDirectory => {
            unreachable!("global tools are built separately")
        }
    };

    ToolDescriptor {
        name,
        kind,
        db_id: db_id.to_string(),
        description,
        input_schema,
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(arguments: JsonValue) -> DbResult<T> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| DbError::parameter(e.to_string()))
}

fn millis(timeout: Option<u64>) -> Option<Duration> {
    timeout.map(Duration::from_millis)
}

fn require_tx_id(args: &TransactionArgs, action: &str) -> DbResult<String> {
    args.transaction_id
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            DbError::parameter(format!("transactionId is required for {} action", action))
        })
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryArgs {
    query: String,
    #[serde(default)]
    params: Vec<JsonValue>,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecuteArgs {
    statement: String,
    #[serde(default)]
    params: Vec<JsonValue>,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum TxAction {
    Begin,
    Commit,
    Rollback,
    Execute,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct TransactionArgs {
    action: TxAction,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    statement: Option<String>,
    #[serde(default)]
    params: Vec<JsonValue>,
    #[serde(default)]
    read_only: bool,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
enum PerfAction {
    #[serde(rename = "getSlowQueries")]
    GetSlowQueries,
    #[serde(rename = "getMetrics")]
    GetMetrics,
    #[serde(rename = "analyzeQuery")]
    AnalyzeQuery,
    #[serde(rename = "reset")]
    Reset,
    #[serde(rename = "setThreshold")]
    SetThreshold,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PerformanceArgs {
    action: PerfAction,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    threshold: Option<f64>,
    #[serde(default)]
    limit: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaArgs {
    #[serde(default)]
    component: Option<SchemaComponent>,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterArgs {
    pattern: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListDirectoryArgs {
    path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_factory() -> ToolFactory {
        let manager = Arc::new(ConnectionManager::new());
        ToolFactory::new(
            DEFAULT_SERVER_NAME,
            manager,
            Arc::new(TransactionRegistry::new()),
            Arc::new(PerformanceAnalyzer::new()),
            &[],
        )
    }

    async fn factory_with_memory_db() -> ToolFactory {
        use crate::models::{ConnectionSpec, DatabaseType};
        let manager = Arc::new(ConnectionManager::new());
        let mut spec = ConnectionSpec::new("mem", DatabaseType::Sqlite);
        spec.database_path = Some(":memory:".to_string());
        manager.load_config(vec![spec]).await.unwrap();
        manager.connect().await.unwrap();
        let db_ids = manager.list_databases().await;
        ToolFactory::new(
            DEFAULT_SERVER_NAME,
            manager,
            Arc::new(TransactionRegistry::new()),
            Arc::new(PerformanceAnalyzer::new()),
            &db_ids,
        )
    }

    #[test]
    fn test_mock_catalog_when_no_databases() {
        let factory = empty_factory();
        let tools = factory.list_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"mcp_db_query_mock"));
        assert!(names.contains(&"mcp_db_transaction_mock"));
        assert!(names.contains(&"mcp_db_filter_table_names_mock"));
        assert!(names.contains(&"mcp_db_list_databases"));
    }

    #[tokio::test]
    async fn test_synthesized_names_per_database() {
        let factory = factory_with_memory_db().await;
        let names: Vec<String> = factory.list_tools().into_iter().map(|t| t.name).collect();
        for kind in [
            "query",
            "execute",
            "transaction",
            "performance",
            "schema",
            "filter_table_names",
        ] {
            let expected = format!("mcp_db_{}_mem", kind);
            assert!(names.contains(&expected), "missing {}", expected);
        }
    }

    #[test]
    fn test_resolve_bare_list_databases() {
        let factory = empty_factory();
        assert!(factory.resolve("list_databases").is_some());
        assert!(factory.resolve("mcp_db_list_databases").is_some());
        assert!(factory.resolve("no_such_tool").is_none());
    }

    #[tokio::test]
    async fn test_list_databases_empty_text() {
        let factory = empty_factory();
        let descriptor = factory.resolve("list_databases").unwrap().clone();
        let result = factory.call(&descriptor, json!({})).await;
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["content"][0]["text"],
            "Available databases:\n\nNo databases configured.\n"
        );
    }

    #[tokio::test]
    async fn test_query_tool_happy_path() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory.resolve("mcp_db_query_mem").unwrap().clone();
        let result = factory
            .call(&descriptor, json!({"query": "SELECT 1 AS n"}))
            .await;
        let json = serde_json::to_value(&result).unwrap();
        let text = json["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("n\n"));
        assert!(text.ends_with("\nTotal rows: 1"));
        assert!(json.get("isError").is_none());
    }

    #[tokio::test]
    async fn test_unknown_argument_rejected() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory.resolve("mcp_db_query_mem").unwrap().clone();
        let result = factory
            .call(&descriptor, json!({"query": "SELECT 1", "bogus": 1}))
            .await;
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_missing_required_argument_is_enveloped() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory.resolve("mcp_db_query_mem").unwrap().clone();
        let result = factory.call(&descriptor, json!({})).await;
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_empty_filter_pattern_is_parameter_error() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory
            .resolve("mcp_db_filter_table_names_mem")
            .unwrap()
            .clone();
        let result = factory.call(&descriptor, json!({"pattern": ""})).await;
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_mock_query_deterministic() {
        let factory = empty_factory();
        let descriptor = factory.resolve("mcp_db_query_mock").unwrap().clone();
        let result = factory
            .call(&descriptor, json!({"query": "SELECT 1"}))
            .await;
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["content"][0]["text"],
            "Mock query executed:\nSELECT 1\n\nThis is a mock response."
        );
    }

    #[tokio::test]
    async fn test_transaction_requires_id_for_commit() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory.resolve("mcp_db_transaction_mem").unwrap().clone();
        let result = factory.call(&descriptor, json!({"action": "commit"})).await;
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_transaction_lifecycle_via_tools() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory.resolve("mcp_db_transaction_mem").unwrap().clone();

        let begin = factory.call(&descriptor, json!({"action": "begin"})).await;
        let begin_json = serde_json::to_value(&begin).unwrap();
        let text = begin_json["content"][0]["text"].as_str().unwrap();
        let tx_id = text.rsplit(' ').next().unwrap().to_string();
        assert!(tx_id.starts_with("tx_mem_"));

        let rollback = factory
            .call(
                &descriptor,
                json!({"action": "rollback", "transactionId": tx_id}),
            )
            .await;
        let rollback_json = serde_json::to_value(&rollback).unwrap();
        assert_eq!(rollback_json["content"][0]["text"], "Transaction rolled back");
    }

    #[tokio::test]
    async fn test_performance_round_trip() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory.resolve("mcp_db_performance_mem").unwrap().clone();

        let result = factory
            .call(&descriptor, json!({"action": "getMetrics"}))
            .await;
        assert!(result.is_error.is_none());

        let result = factory
            .call(
                &descriptor,
                json!({"action": "setThreshold", "threshold": 250}),
            )
            .await;
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["content"][0]["text"],
            "Slow query threshold set to 250 ms"
        );
    }

    #[tokio::test]
    async fn test_schema_tool_pretty_json() {
        let factory = factory_with_memory_db().await;
        let descriptor = factory.resolve("mcp_db_schema_mem").unwrap().clone();
        let result = factory
            .call(&descriptor, json!({"component": "tables"}))
            .await;
        let json = serde_json::to_value(&result).unwrap();
        let text = json["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("\"tables\""));
    }
}
