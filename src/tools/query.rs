//! Query and statement use-cases.

use crate::db::{ConnectionManager, executor};
use crate::error::DbResult;
use crate::models::QueryParam;
use crate::tools::format::format_rows;
use crate::tools::performance::PerformanceAnalyzer;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stateless query/execute operations bound to the connection manager.
pub struct QueryTools {
    manager: Arc<ConnectionManager>,
    analyzer: Arc<PerformanceAnalyzer>,
}

impl QueryTools {
    pub fn new(manager: Arc<ConnectionManager>, analyzer: Arc<PerformanceAnalyzer>) -> Self {
        Self { manager, analyzer }
    }

    /// Run a query and format the result as a row table.
    pub async fn execute_query(
        &self,
        db_id: &str,
        sql: &str,
        params: &[QueryParam],
        deadline: Option<Duration>,
    ) -> DbResult<String> {
        let handle = self.manager.get_database(db_id).await?;
        let start = Instant::now();
        let result = executor::fetch_rows(&handle, sql, params, deadline).await;
        self.analyzer.record(db_id, sql, start.elapsed());
        let (columns, rows) = result?;
        Ok(format_rows(&columns, &rows))
    }

    /// Run a statement and report affected rows and last insert ID.
    pub async fn execute_statement(
        &self,
        db_id: &str,
        sql: &str,
        params: &[QueryParam],
        deadline: Option<Duration>,
    ) -> DbResult<String> {
        let handle = self.manager.get_database(db_id).await?;
        let start = Instant::now();
        let result = executor::execute_sql(&handle, sql, params, deadline).await;
        self.analyzer.record(db_id, sql, start.elapsed());
        let outcome = result?;
        Ok(format!(
            "Statement executed successfully.\nRows affected: {}\nLast insert ID: {}",
            outcome.rows_affected, outcome.last_insert_id
        ))
    }
}
