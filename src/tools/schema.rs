//! Schema introspection and table-name filtering use-cases.

use crate::db::{ConnectionManager, introspect};
use crate::error::{DbError, DbResult};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Schema component selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaComponent {
    Tables,
    Columns,
    Relationships,
    Full,
}

/// Introspection operations bound to the connection manager.
pub struct SchemaTools {
    manager: Arc<ConnectionManager>,
}

impl SchemaTools {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Introspect one component of a database's schema.
    pub async fn introspect(
        &self,
        db_id: &str,
        component: SchemaComponent,
        table: Option<&str>,
        deadline: Option<Duration>,
    ) -> DbResult<JsonValue> {
        let handle = self.manager.get_database(db_id).await?;
        match component {
            SchemaComponent::Tables => introspect::get_tables(&handle, deadline).await,
            SchemaComponent::Columns => {
                let table = table.filter(|t| !t.is_empty()).ok_or_else(|| {
                    DbError::parameter("table parameter is required for columns component")
                })?;
                introspect::get_columns(&handle, table, deadline).await
            }
            SchemaComponent::Relationships => {
                introspect::get_relationships(&handle, table.filter(|t| !t.is_empty()), deadline)
                    .await
            }
            SchemaComponent::Full => introspect::get_full_schema(&handle, deadline).await,
        }
    }

    /// Case-insensitive substring filter over table names, sorted ascending.
    pub async fn filter_table_names(
        &self,
        db_id: &str,
        pattern: &str,
        deadline: Option<Duration>,
    ) -> DbResult<Vec<String>> {
        if pattern.is_empty() {
            return Err(DbError::parameter("pattern parameter is required"));
        }
        let handle = self.manager.get_database(db_id).await?;
        introspect::filter_table_names(&handle, pattern, deadline).await
    }
}
