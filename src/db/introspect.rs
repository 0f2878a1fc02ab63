//! Schema introspection over the dialect strategies.
//!
//! Candidate catalog queries run in order with automatic fallback; only a
//! driver error advances to the next candidate. Exhausting every candidate
//! surfaces as a dialect error carrying the last driver message.

use crate::db::executor;
use crate::db::pool::DatabaseHandle;
use crate::db::strategy::{CatalogQuery, strategy_for};
use crate::error::{DbError, DbResult};
use serde_json::{Map, Value as JsonValue, json};
use std::time::Duration;
use tracing::warn;

async fn execute_with_fallbacks(
    handle: &DatabaseHandle,
    queries: &[CatalogQuery],
    operation: &str,
    deadline: Option<Duration>,
) -> DbResult<Vec<Map<String, JsonValue>>> {
    let mut last_error: Option<DbError> = None;

    for (idx, query) in queries.iter().enumerate() {
        match executor::fetch_rows(handle, &query.sql, &query.params, deadline).await {
            Ok((_, rows)) => return Ok(rows),
            Err(e) => {
                warn!(
                    operation = operation,
                    candidate = idx + 1,
                    error = %e,
                    "catalog query candidate failed"
                );
                last_error = Some(e);
            }
        }
    }

    let detail = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no candidate queries".to_string());
    Err(DbError::dialect(format!(
        "{} failed after trying {} fallback queries: {}",
        operation,
        queries.len(),
        detail
    )))
}

/// List tables.
pub async fn get_tables(
    handle: &DatabaseHandle,
    deadline: Option<Duration>,
) -> DbResult<JsonValue> {
    let strategy = strategy_for(handle.db_type());
    let rows =
        execute_with_fallbacks(handle, &strategy.tables_queries(), "getTables", deadline).await?;
    Ok(json!({
        "tables": rows,
        "dbType": handle.db_type().as_str(),
    }))
}

/// List columns of one table.
pub async fn get_columns(
    handle: &DatabaseHandle,
    table: &str,
    deadline: Option<Duration>,
) -> DbResult<JsonValue> {
    let strategy = strategy_for(handle.db_type());
    let rows = execute_with_fallbacks(
        handle,
        &strategy.columns_queries(table),
        &format!("getColumns[{}]", table),
        deadline,
    )
    .await?;
    Ok(json!({
        "table": table,
        "columns": rows,
        "dbType": handle.db_type().as_str(),
    }))
}

/// List foreign-key relationships, optionally filtered to one table.
pub async fn get_relationships(
    handle: &DatabaseHandle,
    table: Option<&str>,
    deadline: Option<Duration>,
) -> DbResult<JsonValue> {
    let strategy = strategy_for(handle.db_type());
    let rows = execute_with_fallbacks(
        handle,
        &strategy.relationships_queries(table),
        "getRelationships",
        deadline,
    )
    .await?;
    Ok(json!({
        "relationships": rows,
        "dbType": handle.db_type().as_str(),
        "table": table.unwrap_or(""),
    }))
}

/// Assemble the full schema: tables, per-table columns, all relationships.
pub async fn get_full_schema(
    handle: &DatabaseHandle,
    deadline: Option<Duration>,
) -> DbResult<JsonValue> {
    let tables_value = get_tables(handle, deadline).await?;
    let table_rows = tables_value["tables"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    let mut schema = Map::new();
    for row in &table_rows {
        let Some(table_name) = row["table_name"].as_str() else {
            continue;
        };
        let columns = get_columns(handle, table_name, deadline).await?;
        schema.insert(table_name.to_string(), columns);
    }

    let relationships = get_relationships(handle, None, deadline).await?;

    Ok(json!({
        "tables": table_rows,
        "schema": schema,
        "relationships": relationships["relationships"],
    }))
}

/// Filter table names by case-insensitive substring match, sorted ascending.
pub async fn filter_table_names(
    handle: &DatabaseHandle,
    pattern: &str,
    deadline: Option<Duration>,
) -> DbResult<Vec<String>> {
    let strategy = strategy_for(handle.db_type());
    let rows =
        execute_with_fallbacks(handle, &strategy.tables_queries(), "filterTableNames", deadline)
            .await?;

    let needle = pattern.to_lowercase();
    let mut matches: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get("table_name").and_then(|v| v.as_str()))
        .filter(|name| name.to_lowercase().contains(&needle))
        .map(|name| name.to_string())
        .collect();
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionSpec, DatabaseType};

    async fn seeded_handle() -> DatabaseHandle {
        let mut spec = ConnectionSpec::new("mem", DatabaseType::Sqlite);
        spec.database_path = Some(":memory:".to_string());
        spec.apply_defaults();
        let handle = DatabaseHandle::open(&spec).await.unwrap();

        for ddl in [
            "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)",
            "CREATE TABLE posts (id INTEGER PRIMARY KEY, user_id INTEGER, \
             FOREIGN KEY (user_id) REFERENCES users(id))",
        ] {
            executor::execute_sql(&handle, ddl, &[], None).await.unwrap();
        }
        handle
    }

    #[tokio::test]
    async fn test_get_tables() {
        let handle = seeded_handle().await;
        let result = get_tables(&handle, None).await.unwrap();
        let tables = result["tables"].as_array().unwrap();
        let names: Vec<&str> = tables
            .iter()
            .map(|t| t["table_name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"users"));
        assert!(names.contains(&"posts"));
        assert_eq!(result["dbType"], "sqlite");
        handle.close().await;
    }

    #[tokio::test]
    async fn test_get_columns_canonical_shape() {
        let handle = seeded_handle().await;
        let result = get_columns(&handle, "users", None).await.unwrap();
        let columns = result["columns"].as_array().unwrap();
        assert_eq!(columns.len(), 2);
        let first = &columns[0];
        assert_eq!(first["column_name"], "id");
        assert!(first.get("data_type").is_some());
        assert!(first.get("is_nullable").is_some());
        assert!(first.get("column_default").is_some());
        handle.close().await;
    }

    #[tokio::test]
    async fn test_get_relationships() {
        let handle = seeded_handle().await;
        let result = get_relationships(&handle, None, None).await.unwrap();
        let rels = result["relationships"].as_array().unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0]["table_name"], "posts");
        assert_eq!(rels[0]["foreign_table_name"], "users");
        assert_eq!(rels[0]["column_name"], "user_id");
        handle.close().await;
    }

    #[tokio::test]
    async fn test_full_schema_assembly() {
        let handle = seeded_handle().await;
        let result = get_full_schema(&handle, None).await.unwrap();
        assert!(result["tables"].as_array().unwrap().len() >= 2);
        assert!(result["schema"]["users"]["columns"].is_array());
        assert!(result["relationships"].is_array());
        handle.close().await;
    }

    #[tokio::test]
    async fn test_new_table_visible_immediately() {
        let handle = seeded_handle().await;
        executor::execute_sql(&handle, "CREATE TABLE fresh (a TEXT, b INTEGER)", &[], None)
            .await
            .unwrap();
        let result = get_columns(&handle, "fresh", None).await.unwrap();
        let columns = result["columns"].as_array().unwrap();
        assert_eq!(columns[0]["column_name"], "a");
        assert_eq!(columns[1]["column_name"], "b");
        handle.close().await;
    }

    #[tokio::test]
    async fn test_filter_table_names_case_insensitive_sorted() {
        let handle = seeded_handle().await;
        for ddl in [
            "CREATE TABLE wp_users (id INTEGER)",
            "CREATE TABLE wp_posts (id INTEGER)",
            "CREATE TABLE WP_Options (id INTEGER)",
        ] {
            executor::execute_sql(&handle, ddl, &[], None).await.unwrap();
        }

        let matches = filter_table_names(&handle, "WP_", None).await.unwrap();
        assert_eq!(matches, vec!["WP_Options", "wp_posts", "wp_users"]);
        handle.close().await;
    }

    #[tokio::test]
    async fn test_filter_no_matches_is_empty_not_error() {
        let handle = seeded_handle().await;
        let matches = filter_table_names(&handle, "zzz", None).await.unwrap();
        assert!(matches.is_empty());
        handle.close().await;
    }
}
