//! Transaction use-cases: begin, execute, commit, rollback.

use crate::db::{ConnectionManager, TransactionRegistry, TxExecOutcome};
use crate::error::DbResult;
use crate::models::QueryParam;
use crate::tools::format::format_rows;
use crate::tools::performance::PerformanceAnalyzer;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transaction operations bound to the shared manager and registry.
pub struct TransactionTools {
    manager: Arc<ConnectionManager>,
    registry: Arc<TransactionRegistry>,
    analyzer: Arc<PerformanceAnalyzer>,
}

impl TransactionTools {
    pub fn new(
        manager: Arc<ConnectionManager>,
        registry: Arc<TransactionRegistry>,
        analyzer: Arc<PerformanceAnalyzer>,
    ) -> Self {
        Self {
            manager,
            registry,
            analyzer,
        }
    }

    /// Begin a transaction and return its opaque ID.
    pub async fn begin(
        &self,
        db_id: &str,
        read_only: bool,
        deadline: Option<Duration>,
    ) -> DbResult<String> {
        let handle = self.manager.get_database(db_id).await?;
        self.registry.begin(&handle, db_id, read_only, deadline).await
    }

    /// Execute a statement inside an open transaction; queries return a
    /// formatted row table, other statements an affected-rows report.
    pub async fn execute(
        &self,
        transaction_id: &str,
        sql: &str,
        params: &[QueryParam],
        deadline: Option<Duration>,
    ) -> DbResult<String> {
        let (db_id, _, _) = self.registry.get_info(transaction_id).await?;
        let dur = match deadline {
            Some(d) => d,
            // The owning pool is necessarily open while its transaction lives.
            None => self.manager.get_database(&db_id).await?.query_timeout(),
        };

        let start = Instant::now();
        let outcome = self
            .registry
            .execute(transaction_id, sql, params, dur)
            .await;
        self.analyzer.record(&db_id, sql, start.elapsed());

        match outcome? {
            TxExecOutcome::Rows { columns, rows } => Ok(format_rows(&columns, &rows)),
            TxExecOutcome::Exec(exec) => Ok(format!(
                "Rows affected: {}\nLast insert ID: {}",
                exec.rows_affected, exec.last_insert_id
            )),
        }
    }

    /// Commit; the registry entry is evicted even when the commit fails.
    pub async fn commit(&self, transaction_id: &str) -> DbResult<String> {
        self.registry.commit(transaction_id).await?;
        Ok("Transaction committed".to_string())
    }

    /// Roll back; the registry entry is evicted even when the rollback fails.
    pub async fn rollback(&self, transaction_id: &str) -> DbResult<String> {
        self.registry.rollback(transaction_id).await?;
        Ok("Transaction rolled back".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::models::{ConnectionSpec, DatabaseType};

    async fn tools() -> TransactionTools {
        let manager = Arc::new(ConnectionManager::new());
        let mut spec = ConnectionSpec::new("mem", DatabaseType::Sqlite);
        spec.database_path = Some(":memory:".to_string());
        manager.load_config(vec![spec]).await.unwrap();
        manager.connect().await.unwrap();
        TransactionTools::new(
            manager,
            Arc::new(TransactionRegistry::new()),
            Arc::new(PerformanceAnalyzer::new()),
        )
    }

    #[tokio::test]
    async fn test_begin_commit_cycle() {
        let t = tools().await;
        let tx_id = t.begin("mem", false, None).await.unwrap();
        assert!(tx_id.starts_with("tx_mem_"));
        let status = t.commit(&tx_id).await.unwrap();
        assert_eq!(status, "Transaction committed");
    }

    #[tokio::test]
    async fn test_execute_unknown_transaction() {
        let t = tools().await;
        let err = t
            .execute("tx_nope", "SELECT 1", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::TxNotFound { .. }));
    }

    #[tokio::test]
    async fn test_query_inside_transaction_formats_rows() {
        let t = tools().await;
        let tx_id = t.begin("mem", false, None).await.unwrap();
        let text = t
            .execute(&tx_id, "SELECT 3 AS three", &[], None)
            .await
            .unwrap();
        assert!(text.starts_with("three\n"));
        assert!(text.ends_with("\nTotal rows: 1"));
        t.rollback(&tx_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_statement_inside_transaction_reports_counts() {
        let t = tools().await;
        let tx_id = t.begin("mem", false, None).await.unwrap();
        t.execute(&tx_id, "CREATE TABLE t (id INTEGER)", &[], None)
            .await
            .unwrap();
        let text = t
            .execute(&tx_id, "INSERT INTO t (id) VALUES (1)", &[], None)
            .await
            .unwrap();
        assert!(text.contains("Rows affected: 1"));
        t.commit(&tx_id).await.unwrap();
    }
}
