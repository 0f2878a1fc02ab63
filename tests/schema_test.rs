//! Schema introspection against a real SQLite database.

use multidb_mcp_server::db::{ConnectionManager, executor, introspect};
use multidb_mcp_server::models::{ConnectionSpec, DatabaseType};
use std::sync::Arc;

async fn seeded_manager(dir: &tempfile::TempDir) -> Arc<ConnectionManager> {
    let mut spec = ConnectionSpec::new("shop", DatabaseType::Sqlite);
    spec.database_path = Some(dir.path().join("shop.db").display().to_string());
    let manager = Arc::new(ConnectionManager::new());
    manager.load_config(vec![spec]).await.unwrap();
    manager.connect().await.unwrap();

    let handle = manager.get_database("shop").await.unwrap();
    for ddl in [
        "CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT NOT NULL, \
         email TEXT DEFAULT 'none')",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer_id INTEGER, \
         total REAL, FOREIGN KEY (customer_id) REFERENCES customers(id))",
        "CREATE TABLE wp_users (id INTEGER)",
        "CREATE TABLE wp_posts (id INTEGER)",
        "CREATE TABLE users (id INTEGER)",
        "CREATE TABLE WP_Options (id INTEGER)",
    ] {
        executor::execute_sql(&handle, ddl, &[], None).await.unwrap();
    }
    manager
}

#[tokio::test]
async fn tables_component_lists_all_tables() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded_manager(&dir).await;
    let handle = manager.get_database("shop").await.unwrap();

    let value = introspect::get_tables(&handle, None).await.unwrap();
    let names: Vec<&str> = value["tables"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["table_name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"customers"));
    assert!(names.contains(&"orders"));
    assert_eq!(value["dbType"], "sqlite");
    manager.close_all().await;
}

#[tokio::test]
async fn columns_component_canonical_names_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded_manager(&dir).await;
    let handle = manager.get_database("shop").await.unwrap();

    let value = introspect::get_columns(&handle, "customers", None).await.unwrap();
    let columns = value["columns"].as_array().unwrap();
    assert_eq!(columns.len(), 3);

    assert_eq!(columns[0]["column_name"], "id");
    assert_eq!(columns[1]["column_name"], "name");
    assert_eq!(columns[2]["column_name"], "email");

    assert_eq!(columns[1]["is_nullable"], "NO");
    assert_eq!(columns[2]["column_default"], "'none'");
    assert!(columns[0]["data_type"].as_str().is_some());
    manager.close_all().await;
}

#[tokio::test]
async fn relationships_component_reports_foreign_keys() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded_manager(&dir).await;
    let handle = manager.get_database("shop").await.unwrap();

    let value = introspect::get_relationships(&handle, None, None).await.unwrap();
    let rels = value["relationships"].as_array().unwrap();
    assert_eq!(rels.len(), 1);
    let rel = &rels[0];
    assert_eq!(rel["table_schema"], "main");
    assert_eq!(rel["table_name"], "orders");
    assert_eq!(rel["column_name"], "customer_id");
    assert_eq!(rel["foreign_table_name"], "customers");
    assert_eq!(rel["foreign_column_name"], "id");
    assert!(rel["constraint_name"].as_str().unwrap().starts_with("fk_"));
    manager.close_all().await;
}

#[tokio::test]
async fn full_schema_composes_tables_columns_relationships() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded_manager(&dir).await;
    let handle = manager.get_database("shop").await.unwrap();

    let value = introspect::get_full_schema(&handle, None).await.unwrap();
    assert!(value["tables"].as_array().unwrap().len() >= 6);
    assert!(value["schema"]["orders"]["columns"].is_array());
    assert!(value["relationships"].as_array().unwrap().len() == 1);
    manager.close_all().await;
}

#[tokio::test]
async fn ddl_immediately_visible_to_introspection() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded_manager(&dir).await;
    let handle = manager.get_database("shop").await.unwrap();

    executor::execute_sql(
        &handle,
        "CREATE TABLE fresh (alpha TEXT, beta INTEGER, gamma REAL)",
        &[],
        None,
    )
    .await
    .unwrap();

    let value = introspect::get_columns(&handle, "fresh", None).await.unwrap();
    let columns = value["columns"].as_array().unwrap();
    let names: Vec<&str> = columns
        .iter()
        .map(|c| c["column_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    manager.close_all().await;
}

// Scenario: tables {wp_users, wp_posts, users, WP_Options}, pattern "WP_".
#[tokio::test]
async fn filter_table_names_case_insensitive_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded_manager(&dir).await;
    let handle = manager.get_database("shop").await.unwrap();

    let names = introspect::filter_table_names(&handle, "WP_", None)
        .await
        .unwrap();
    assert_eq!(names, vec!["WP_Options", "wp_posts", "wp_users"]);
    manager.close_all().await;
}

#[tokio::test]
async fn filter_lowercase_pattern_same_result() {
    let dir = tempfile::tempdir().unwrap();
    let manager = seeded_manager(&dir).await;
    let handle = manager.get_database("shop").await.unwrap();

    let names = introspect::filter_table_names(&handle, "wp_", None)
        .await
        .unwrap();
    assert_eq!(names, vec!["WP_Options", "wp_posts", "wp_users"]);
    manager.close_all().await;
}
