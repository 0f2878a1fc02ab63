//! Query and statement execution over a database handle.
//!
//! The use-case layer and the introspector both funnel through these two
//! entry points so that timeouts, parameter binding and row materialization
//! behave identically everywhere.

use crate::db::params::{bind_mysql_param, bind_postgres_param, bind_sqlite_param};
use crate::db::pool::{DatabaseHandle, DbPool};
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{ExecOutcome, QueryParam};
use serde_json::{Map, Value as JsonValue};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// A materialized result set: column names in select order, plus row maps.
pub type RowSet = (Vec<String>, Vec<Map<String, JsonValue>>);

/// Execute a query returning rows.
pub async fn fetch_rows(
    handle: &DatabaseHandle,
    sql: &str,
    params: &[QueryParam],
    deadline: Option<Duration>,
) -> DbResult<RowSet> {
    let dur = deadline.unwrap_or_else(|| handle.query_timeout());
    debug!(sql = %sql, params = params.len(), timeout_secs = dur.as_secs(), "executing query");

    match handle.pool() {
        DbPool::MySql(pool) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            let rows = run_with_timeout("query", dur, query.fetch_all(pool)).await?;
            Ok(materialize(&rows))
        }
        DbPool::Postgres(pool) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            let rows = run_with_timeout("query", dur, query.fetch_all(pool)).await?;
            Ok(materialize(&rows))
        }
        DbPool::Sqlite(pool) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            let rows = run_with_timeout("query", dur, query.fetch_all(pool)).await?;
            Ok(materialize(&rows))
        }
        DbPool::Oracle(pool) => pool.query(sql.to_string(), params.to_vec(), dur).await,
    }
}

/// Execute a statement that does not return rows.
pub async fn execute_sql(
    handle: &DatabaseHandle,
    sql: &str,
    params: &[QueryParam],
    deadline: Option<Duration>,
) -> DbResult<ExecOutcome> {
    let dur = deadline.unwrap_or_else(|| handle.query_timeout());
    debug!(sql = %sql, params = params.len(), timeout_secs = dur.as_secs(), "executing statement");

    match handle.pool() {
        DbPool::MySql(pool) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_mysql_param(query, param);
            }
            let result = run_with_timeout("execute", dur, query.execute(pool)).await?;
            Ok(ExecOutcome {
                rows_affected: result.rows_affected() as i64,
                last_insert_id: result.last_insert_id() as i64,
            })
        }
        DbPool::Postgres(pool) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_postgres_param(query, param);
            }
            let result = run_with_timeout("execute", dur, query.execute(pool)).await?;
            Ok(ExecOutcome {
                rows_affected: result.rows_affected() as i64,
                // PostgreSQL reports no last-insert id through the wire protocol.
                last_insert_id: -1,
            })
        }
        DbPool::Sqlite(pool) => {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_sqlite_param(query, param);
            }
            let result = run_with_timeout("execute", dur, query.execute(pool)).await?;
            Ok(ExecOutcome {
                rows_affected: result.rows_affected() as i64,
                last_insert_id: result.last_insert_rowid(),
            })
        }
        DbPool::Oracle(pool) => {
            let affected = pool.execute(sql.to_string(), params.to_vec(), dur).await?;
            Ok(ExecOutcome {
                rows_affected: affected as i64,
                last_insert_id: -1,
            })
        }
    }
}

async fn run_with_timeout<T, F>(operation: &str, dur: Duration, fut: F) -> DbResult<T>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(dur, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(DbError::from(e)),
        Err(_) => Err(DbError::timeout(operation, dur.as_secs())),
    }
}

fn materialize<R: RowToJson>(rows: &[R]) -> RowSet {
    let columns = rows
        .first()
        .map(|r| r.column_names())
        .unwrap_or_default();
    let maps = rows.iter().map(|r| r.to_json_map()).collect();
    (columns, maps)
}
