//! Oracle driver shim.
//!
//! The Oracle client library is blocking, so every call runs on the blocking
//! thread pool via `spawn_blocking`. Pooling is delegated to `r2d2`; a
//! transaction checks a dedicated connection out of the pool and holds it
//! until commit or rollback.

use crate::error::{DbError, DbResult};
use crate::models::{ConnectionSpec, QueryParam};
use oracle::sql_type::ToSql;
use r2d2_oracle::OracleConnectionManager;
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::time::Duration;
use tokio::time::timeout;

type PooledConn = r2d2::PooledConnection<OracleConnectionManager>;

/// Pooled Oracle handle.
#[derive(Clone)]
pub struct OraclePool {
    pool: r2d2::Pool<OracleConnectionManager>,
}

impl fmt::Debug for OraclePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OraclePool")
            .field("state", &self.pool.state())
            .finish()
    }
}

/// EZ-connect descriptor, or the TNS alias when one is configured.
fn connect_descriptor(spec: &ConnectionSpec) -> String {
    if let Some(entry) = spec.tns_entry.as_deref().filter(|s| !s.is_empty()) {
        return entry.to_string();
    }
    let identifier = [
        spec.service_name.as_deref(),
        spec.sid.as_deref(),
        Some(spec.name.as_str()),
    ]
    .into_iter()
    .flatten()
    .find(|s| !s.is_empty())
    .unwrap_or("");
    format!("//{}:{}/{}", spec.host, spec.effective_port(), identifier)
}

impl OraclePool {
    /// Build the pool without establishing connections; `ping` validates.
    pub fn open(spec: &ConnectionSpec) -> DbResult<Self> {
        let manager = OracleConnectionManager::new(
            &spec.user,
            &spec.password,
            &connect_descriptor(spec),
        );
        let pool = r2d2::Pool::builder()
            .max_size(spec.max_open_conns.unwrap_or(50))
            .min_idle(Some(spec.max_idle_conns.unwrap_or(10)))
            .max_lifetime(spec.conn_max_lifetime.map(Duration::from_secs))
            .idle_timeout(spec.conn_max_idle_time.map(Duration::from_secs))
            .connection_timeout(Duration::from_secs(spec.connect_timeout_secs() as u64))
            .build_unchecked(manager);
        Ok(Self { pool })
    }

    async fn run_blocking<T, F>(&self, operation: &str, dur: Duration, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(PooledConn) -> DbResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        let task = tokio::task::spawn_blocking(move || {
            let conn = pool.get().map_err(DbError::from)?;
            f(conn)
        });
        match timeout(dur, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(DbError::internal(format!(
                "oracle worker failed: {}",
                join_err
            ))),
            Err(_) => Err(DbError::timeout(operation, dur.as_secs())),
        }
    }

    /// Validate connectivity with a bounded wait.
    pub async fn ping(&self, dur: Duration) -> DbResult<()> {
        self.run_blocking("oracle ping", dur, |conn| {
            conn.ping().map_err(DbError::from)
        })
        .await
    }

    /// Run a query and materialize the rows.
    pub async fn query(
        &self,
        sql: String,
        params: Vec<QueryParam>,
        dur: Duration,
    ) -> DbResult<(Vec<String>, Vec<Map<String, JsonValue>>)> {
        self.run_blocking("oracle query", dur, move |mut conn| {
            conn.set_autocommit(true);
            query_rows_on(&conn, &sql, &params)
        })
        .await
    }

    /// Run a statement and return the affected row count.
    pub async fn execute(
        &self,
        sql: String,
        params: Vec<QueryParam>,
        dur: Duration,
    ) -> DbResult<u64> {
        self.run_blocking("oracle execute", dur, move |mut conn| {
            conn.set_autocommit(true);
            execute_on(&conn, &sql, &params)
        })
        .await
    }

    /// Check a dedicated connection out of the pool and start a transaction.
    pub async fn begin(&self, read_only: bool, dur: Duration) -> DbResult<OracleTx> {
        self.run_blocking("oracle begin", dur, move |mut conn| {
            conn.set_autocommit(false);
            if read_only {
                conn.execute("SET TRANSACTION READ ONLY", &[])
                    .map_err(DbError::from)?;
            }
            Ok(OracleTx::from_conn(conn))
        })
        .await
    }
}

/// An open Oracle transaction holding its pooled connection.
///
/// All methods are blocking; callers run them inside `spawn_blocking`. The
/// mutex exists so the handle can live in the shared transaction registry;
/// it is never contended, since the registry serializes access per entry.
pub struct OracleTx {
    conn: std::sync::Mutex<PooledConn>,
}

impl fmt::Debug for OracleTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OracleTx")
    }
}

impl OracleTx {
    fn from_conn(conn: PooledConn) -> Self {
        Self {
            conn: std::sync::Mutex::new(conn),
        }
    }

    pub fn query_rows(
        &self,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<(Vec<String>, Vec<Map<String, JsonValue>>)> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::internal("oracle transaction lock poisoned"))?;
        query_rows_on(&conn, sql, params)
    }

    pub fn execute_stmt(&self, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| DbError::internal("oracle transaction lock poisoned"))?;
        execute_on(&conn, sql, params)
    }

    pub fn commit(self) -> DbResult<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| DbError::internal("oracle transaction lock poisoned"))?;
        conn.commit().map_err(DbError::from)
    }

    pub fn rollback(self) -> DbResult<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| DbError::internal("oracle transaction lock poisoned"))?;
        conn.rollback().map_err(DbError::from)
    }
}

fn boxed_params(params: &[QueryParam]) -> Vec<Box<dyn ToSql>> {
    params
        .iter()
        .map(|p| match p {
            QueryParam::Null => Box::new(None::<String>) as Box<dyn ToSql>,
            // Oracle has no SQL boolean; 0/1 is the convention.
            QueryParam::Bool(b) => Box::new(if *b { 1i64 } else { 0i64 }) as Box<dyn ToSql>,
            QueryParam::Int(i) => Box::new(*i) as Box<dyn ToSql>,
            QueryParam::Float(f) => Box::new(*f) as Box<dyn ToSql>,
            QueryParam::String(s) => Box::new(s.clone()) as Box<dyn ToSql>,
        })
        .collect()
}

fn query_rows_on(
    conn: &oracle::Connection,
    sql: &str,
    params: &[QueryParam],
) -> DbResult<(Vec<String>, Vec<Map<String, JsonValue>>)> {
    let boxed = boxed_params(params);
    let refs: Vec<&dyn ToSql> = boxed.iter().map(|b| &**b).collect();

    let result_set = conn.query(sql, &refs).map_err(DbError::from)?;
    let columns: Vec<String> = result_set
        .column_info()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let mut rows = Vec::new();
    for row in result_set {
        let row = row.map_err(DbError::from)?;
        let mut map = Map::new();
        for (idx, name) in columns.iter().enumerate() {
            // Every Oracle scalar converts to a string representation; values
            // that refuse (LOBs in odd states) surface as NULL.
            let value = match row.get::<usize, Option<String>>(idx) {
                Ok(Some(text)) => JsonValue::String(text),
                _ => JsonValue::Null,
            };
            map.insert(name.clone(), value);
        }
        rows.push(map);
    }

    Ok((columns, rows))
}

fn execute_on(conn: &oracle::Connection, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
    let boxed = boxed_params(params);
    let refs: Vec<&dyn ToSql> = boxed.iter().map(|b| &**b).collect();
    let stmt = conn.execute(sql, &refs).map_err(DbError::from)?;
    stmt.row_count().map_err(DbError::from)
}
