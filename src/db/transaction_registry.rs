//! Transaction registry: in-flight transactions that outlive single RPCs.
//!
//! Begin, execute, commit and rollback arrive as independent requests, so
//! open transactions are parked here under opaque string IDs. The map lock
//! is held only for map mutations: an executor checks the transaction handle
//! out of its record, runs the driver call unlocked, and checks it back in.
//! A second request racing the same ID finds the handle checked out and is
//! rejected as busy. Terminators remove the record before invoking the
//! driver, so a failed commit still evicts the entry.

use crate::db::oracle::OracleTx;
use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::{DatabaseHandle, DbPool};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{ExecOutcome, QueryParam};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use sqlx::{MySql, Postgres, Sqlite, Transaction};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use uuid::Uuid;
use tracing::{debug, info};

/// Database-specific transaction handle.
pub enum DbTransaction {
    MySql(Transaction<'static, MySql>),
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
    Oracle(OracleTx),
}

impl DbTransaction {
    async fn commit(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Sqlite(tx) => tx.commit().await.map_err(DbError::from),
            DbTransaction::Oracle(tx) => run_oracle(move || tx.commit()).await,
        }
    }

    async fn rollback(self) -> DbResult<()> {
        match self {
            DbTransaction::MySql(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Postgres(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Sqlite(tx) => tx.rollback().await.map_err(DbError::from),
            DbTransaction::Oracle(tx) => run_oracle(move || tx.rollback()).await,
        }
    }
}

async fn run_oracle<T, F>(f: F) -> DbResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> DbResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DbError::internal(format!("oracle worker failed: {}", e)))?
}

/// Result of executing a statement inside a transaction.
#[derive(Debug)]
pub enum TxExecOutcome {
    Rows {
        columns: Vec<String>,
        rows: Vec<Map<String, JsonValue>>,
    },
    Exec(ExecOutcome),
}

struct TxRecord {
    /// `None` while an executor has the handle checked out.
    transaction: Option<DbTransaction>,
    db_id: String,
    read_only: bool,
    created_at: DateTime<Utc>,
}

/// Keyed store of open transactions.
pub struct TransactionRegistry {
    transactions: RwLock<HashMap<String, TxRecord>>,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self {
            transactions: RwLock::new(HashMap::new()),
        }
    }

    /// Open a transaction against the handle and park it under a fresh ID.
    pub async fn begin(
        &self,
        handle: &DatabaseHandle,
        db_id: &str,
        read_only: bool,
        deadline: Option<Duration>,
    ) -> DbResult<String> {
        let dur = deadline.unwrap_or_else(|| handle.query_timeout());

        let tx = match handle.pool() {
            DbPool::MySql(pool) => {
                // MySQL cannot alter a transaction once started, so the
                // read-only characteristic goes into the opening statement.
                let tx = if read_only {
                    begin_with_timeout(dur, pool.begin_with("START TRANSACTION READ ONLY"))
                        .await?
                } else {
                    begin_with_timeout(dur, pool.begin()).await?
                };
                DbTransaction::MySql(tx)
            }
            DbPool::Postgres(pool) => {
                let mut tx = begin_with_timeout(dur, pool.begin()).await?;
                if read_only {
                    sqlx::query("SET TRANSACTION READ ONLY")
                        .execute(&mut *tx)
                        .await
                        .map_err(DbError::from)?;
                }
                DbTransaction::Postgres(tx)
            }
            DbPool::Sqlite(pool) => {
                let tx = begin_with_timeout(dur, pool.begin()).await?;
                DbTransaction::Sqlite(tx)
            }
            DbPool::Oracle(pool) => DbTransaction::Oracle(pool.begin(read_only, dur).await?),
        };

        let transaction_id = format!("tx_{}_{}", db_id, Uuid::new_v4().simple());
        let record = TxRecord {
            transaction: Some(tx),
            db_id: db_id.to_string(),
            read_only,
            created_at: Utc::now(),
        };

        {
            let mut txs = self.transactions.write().await;
            txs.insert(transaction_id.clone(), record);
        }

        info!(
            transaction_id = %transaction_id,
            db_id = %db_id,
            read_only,
            "transaction started"
        );
        Ok(transaction_id)
    }

    /// Execute a statement on a parked transaction.
    ///
    /// A case-insensitive leading `SELECT` routes to the query path; anything
    /// else is executed, returning `{rows_affected, last_insert_id}` with
    /// `-1` where the driver cannot supply a value.
    pub async fn execute(
        &self,
        transaction_id: &str,
        sql: &str,
        params: &[QueryParam],
        deadline: Duration,
    ) -> DbResult<TxExecOutcome> {
        let tx = self.checkout(transaction_id).await?;

        let result = match tx {
            DbTransaction::Oracle(oracle_tx) => {
                let (returned, result) = oracle_run(oracle_tx, sql, params).await;
                if let Some(oracle_tx) = returned {
                    self.checkin(transaction_id, DbTransaction::Oracle(oracle_tx))
                        .await;
                }
                result
            }
            mut sqlx_tx => {
                let result = run_in_transaction(&mut sqlx_tx, sql, params, deadline).await;
                self.checkin(transaction_id, sqlx_tx).await;
                result
            }
        };

        debug!(transaction_id = %transaction_id, sql = %sql, ok = result.is_ok(), "executed in transaction");
        result
    }

    /// Commit and evict. The record is removed before the driver call.
    pub async fn commit(&self, transaction_id: &str) -> DbResult<()> {
        let tx = self.take_for_termination(transaction_id).await?;
        tx.commit().await?;
        info!(transaction_id = %transaction_id, "transaction committed");
        Ok(())
    }

    /// Roll back and evict. The record is removed before the driver call.
    pub async fn rollback(&self, transaction_id: &str) -> DbResult<()> {
        let tx = self.take_for_termination(transaction_id).await?;
        tx.rollback().await?;
        info!(transaction_id = %transaction_id, "transaction rolled back");
        Ok(())
    }

    /// Database ID, read-only flag and start time for a parked transaction.
    pub async fn get_info(&self, transaction_id: &str) -> DbResult<(String, bool, DateTime<Utc>)> {
        let txs = self.transactions.read().await;
        txs.get(transaction_id)
            .map(|r| (r.db_id.clone(), r.read_only, r.created_at))
            .ok_or_else(|| DbError::tx_not_found(transaction_id))
    }

    pub async fn count(&self) -> usize {
        self.transactions.read().await.len()
    }

    async fn checkout(&self, transaction_id: &str) -> DbResult<DbTransaction> {
        let mut txs = self.transactions.write().await;
        let record = txs
            .get_mut(transaction_id)
            .ok_or_else(|| DbError::tx_not_found(transaction_id))?;
        record
            .transaction
            .take()
            .ok_or_else(|| DbError::tx_busy(transaction_id))
    }

    async fn checkin(&self, transaction_id: &str, tx: DbTransaction) {
        let mut txs = self.transactions.write().await;
        if let Some(record) = txs.get_mut(transaction_id) {
            record.transaction = Some(tx);
        }
        // A missing record means the transaction handle has nowhere to go;
        // dropping it rolls back driver-side.
    }

    async fn take_for_termination(&self, transaction_id: &str) -> DbResult<DbTransaction> {
        let mut txs = self.transactions.write().await;
        match txs.remove(transaction_id) {
            None => Err(DbError::tx_not_found(transaction_id)),
            Some(record) => match record.transaction {
                Some(tx) => Ok(tx),
                None => {
                    // Checked out by an executor; put the record back.
                    txs.insert(transaction_id.to_string(), record);
                    Err(DbError::tx_busy(transaction_id))
                }
            },
        }
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn begin_with_timeout<DB, F>(dur: Duration, fut: F) -> DbResult<Transaction<'static, DB>>
where
    DB: sqlx::Database,
    F: std::future::Future<Output = Result<Transaction<'static, DB>, sqlx::Error>>,
{
    match timeout(dur, fut).await {
        Ok(Ok(tx)) => Ok(tx),
        Ok(Err(e)) => Err(DbError::from(e)),
        Err(_) => Err(DbError::timeout("transaction begin", dur.as_secs())),
    }
}

fn is_query(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .map(|prefix| prefix.eq_ignore_ascii_case("SELECT"))
        .unwrap_or(false)
}

async fn run_in_transaction(
    tx: &mut DbTransaction,
    sql: &str,
    params: &[QueryParam],
    deadline: Duration,
) -> DbResult<TxExecOutcome> {
    if is_query(sql) {
        query_in_transaction(tx, sql, params, deadline).await
    } else {
        exec_in_transaction(tx, sql, params, deadline).await
    }
}

/// Oracle calls are blocking, so the handle moves to the blocking pool and
/// back. No deadline is applied: the client library cannot be interrupted
/// mid-call, and abandoning the handle would orphan the transaction.
async fn oracle_run(
    oracle_tx: OracleTx,
    sql: &str,
    params: &[QueryParam],
) -> (Option<OracleTx>, DbResult<TxExecOutcome>) {
    let query_path = is_query(sql);
    let sql = sql.to_string();
    let params = params.to_vec();
    let joined = tokio::task::spawn_blocking(move || {
        let result = if query_path {
            oracle_tx
                .query_rows(&sql, &params)
                .map(|(columns, rows)| TxExecOutcome::Rows { columns, rows })
        } else {
            oracle_tx.execute_stmt(&sql, &params).map(|affected| {
                TxExecOutcome::Exec(ExecOutcome {
                    rows_affected: affected as i64,
                    last_insert_id: -1,
                })
            })
        };
        (oracle_tx, result)
    })
    .await;

    match joined {
        Ok((oracle_tx, result)) => (Some(oracle_tx), result),
        Err(e) => (
            None,
            Err(DbError::internal(format!("oracle worker failed: {}", e))),
        ),
    }
}

async fn query_in_transaction(
    tx: &mut DbTransaction,
    sql: &str,
    params: &[QueryParam],
    deadline: Duration,
) -> DbResult<TxExecOutcome> {
    use futures_util::TryStreamExt;

    match tx {
        DbTransaction::MySql(tx) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            let rows: Vec<sqlx::mysql::MySqlRow> =
                with_deadline(deadline, query.fetch(&mut **tx).try_collect()).await?;
            Ok(rows_outcome(&rows))
        }
        DbTransaction::Postgres(tx) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            let rows: Vec<sqlx::postgres::PgRow> =
                with_deadline(deadline, query.fetch(&mut **tx).try_collect()).await?;
            Ok(rows_outcome(&rows))
        }
        DbTransaction::Sqlite(tx) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            let rows: Vec<sqlx::sqlite::SqliteRow> =
                with_deadline(deadline, query.fetch(&mut **tx).try_collect()).await?;
            Ok(rows_outcome(&rows))
        }
        // Oracle is handled before the sqlx path; see `execute`.
        DbTransaction::Oracle(_) => Err(DbError::internal("oracle transaction handle mismatch")),
    }
}

async fn exec_in_transaction(
    tx: &mut DbTransaction,
    sql: &str,
    params: &[QueryParam],
    deadline: Duration,
) -> DbResult<TxExecOutcome> {
    match tx {
        DbTransaction::MySql(tx) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            let result = with_deadline(deadline, query.execute(&mut **tx)).await?;
            Ok(TxExecOutcome::Exec(ExecOutcome {
                rows_affected: result.rows_affected() as i64,
                last_insert_id: result.last_insert_id() as i64,
            }))
        }
        DbTransaction::Postgres(tx) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            let result = with_deadline(deadline, query.execute(&mut **tx)).await?;
            Ok(TxExecOutcome::Exec(ExecOutcome {
                rows_affected: result.rows_affected() as i64,
                last_insert_id: -1,
            }))
        }
        DbTransaction::Sqlite(tx) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            let result = with_deadline(deadline, query.execute(&mut **tx)).await?;
            Ok(TxExecOutcome::Exec(ExecOutcome {
                rows_affected: result.rows_affected() as i64,
                last_insert_id: result.last_insert_rowid(),
            }))
        }
        // Oracle is handled before the sqlx path; see `execute`.
        DbTransaction::Oracle(_) => Err(DbError::internal("oracle transaction handle mismatch")),
    }
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> DbResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DbError::from(e)),
        Err(_) => Err(DbError::timeout("transaction statement", deadline.as_secs())),
    }
}

fn rows_outcome<R: RowToJson>(rows: &[R]) -> TxExecOutcome {
    let columns = rows
        .first()
        .map(|r| r.column_names())
        .unwrap_or_default();
    TxExecOutcome::Rows {
        columns,
        rows: rows.iter().map(|r| r.to_json_map()).collect(),
    }
}
