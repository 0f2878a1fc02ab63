//! Typed connection pools and the runtime database handle.
//!
//! One adapter per dialect: translate a [`ConnectionSpec`] into driver
//! options, open a pool, ping it with a bounded wait, and apply post-connect
//! configuration. Handles are only ever reached through the connection
//! manager.

use crate::db::dsn;
use crate::db::oracle::OraclePool;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionSpec, DatabaseType, JournalMode, SslMode};
use sqlx::mysql::MySqlConnectOptions;
use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, MySqlPool, PgPool, SqlitePool};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Ping deadline applied when a pool is opened.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    MySql(MySqlPool),
    Postgres(PgPool),
    Sqlite(SqlitePool),
    Oracle(OraclePool),
}

impl DbPool {
    pub fn db_type(&self) -> DatabaseType {
        match self {
            DbPool::MySql(_) => DatabaseType::MySql,
            DbPool::Postgres(_) => DatabaseType::Postgres,
            DbPool::Sqlite(_) => DatabaseType::Sqlite,
            DbPool::Oracle(_) => DatabaseType::Oracle,
        }
    }

    /// Close the underlying pool. Oracle pools close on drop.
    pub async fn close(&self) {
        match self {
            DbPool::MySql(pool) => pool.close().await,
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
            DbPool::Oracle(_) => {}
        }
    }
}

/// Runtime object for one configured database.
#[derive(Debug, Clone)]
pub struct DatabaseHandle {
    db_type: DatabaseType,
    pool: DbPool,
    dsn: String,
    masked_dsn: String,
    query_timeout: Duration,
}

impl DatabaseHandle {
    /// Open a pool for the connection spec, ping it, and apply post-connect
    /// settings.
    pub async fn open(spec: &ConnectionSpec) -> DbResult<Self> {
        let effective_dsn = dsn::dsn(spec);
        let masked_dsn = dsn::masked(spec);
        let query_timeout = Duration::from_secs(spec.query_timeout_secs() as u64);

        let pool = match spec.db_type {
            DatabaseType::MySql => DbPool::MySql(open_mysql(spec).await?),
            DatabaseType::Postgres => DbPool::Postgres(open_postgres(spec).await?),
            DatabaseType::Sqlite => {
                let pool = open_sqlite(spec).await?;
                apply_sqlite_pragmas(&pool, spec).await;
                DbPool::Sqlite(pool)
            }
            DatabaseType::Oracle => {
                let pool = OraclePool::open(spec)?;
                pool.ping(PING_TIMEOUT).await?;
                DbPool::Oracle(pool)
            }
        };

        info!(
            id = %spec.id,
            db_type = %spec.db_type,
            dsn = %masked_dsn,
            "connected to database"
        );

        Ok(Self {
            db_type: spec.db_type,
            pool,
            dsn: effective_dsn,
            masked_dsn,
            query_timeout,
        })
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// The DSN with credentials masked, safe for logs and telemetry.
    pub fn connection_string(&self) -> &str {
        &self.masked_dsn
    }

    /// The effective DSN. Contains credentials; never log it.
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

async fn open_mysql(spec: &ConnectionSpec) -> DbResult<MySqlPool> {
    let options = MySqlConnectOptions::new()
        .host(&spec.host)
        .port(spec.effective_port())
        .username(&spec.user)
        .password(&spec.password)
        .database(&spec.name)
        .charset("utf8mb4");

    let pool = pool_options::<sqlx::MySql>(spec)
        .connect_with(options)
        .await
        .map_err(|e| DbError::connection(format!("failed to connect: {}", e)))?;

    ping_pool(&pool, "mysql").await?;
    Ok(pool)
}

async fn open_postgres(spec: &ConnectionSpec) -> DbResult<PgPool> {
    let mut options = PgConnectOptions::new()
        .host(&spec.host)
        .port(spec.effective_port())
        .username(&spec.user)
        .password(&spec.password)
        .ssl_mode(pg_ssl_mode(spec.ssl_mode));
    if !spec.name.is_empty() {
        options = options.database(&spec.name);
    }
    if let Some(cert) = spec.ssl_cert.as_deref().filter(|s| !s.is_empty()) {
        options = options.ssl_client_cert(cert);
    }
    if let Some(key) = spec.ssl_key.as_deref().filter(|s| !s.is_empty()) {
        options = options.ssl_client_key(key);
    }
    if let Some(root) = spec.ssl_root_cert.as_deref().filter(|s| !s.is_empty()) {
        options = options.ssl_root_cert(root);
    }
    if let Some(app) = spec.application_name.as_deref().filter(|s| !s.is_empty()) {
        options = options.application_name(app);
    }

    let pool = pool_options::<sqlx::Postgres>(spec)
        .connect_with(options)
        .await
        .map_err(|e| DbError::connection(format!("failed to connect: {}", e)))?;

    ping_pool(&pool, "postgres").await?;
    Ok(pool)
}

async fn open_sqlite(spec: &ConnectionSpec) -> DbResult<SqlitePool> {
    let path = spec.sqlite_path();
    let mut options = if path == ":memory:" {
        SqliteConnectOptions::new().in_memory(true)
    } else {
        SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(!spec.read_only)
    };
    options = options
        .read_only(spec.read_only)
        .foreign_keys(true)
        .journal_mode(sqlite_journal_mode(spec.journal_mode));
    if let Some(key) = spec.encryption_key.as_deref().filter(|k| !k.is_empty()) {
        // No-op on stock SQLite; honored when the driver links SQLCipher.
        options = options
            .pragma("key", key.to_string())
            .pragma("cipher_page_size", "4096");
    }

    // A pooled :memory: database is one database per connection; a single
    // connection keeps it coherent.
    let mut pool_opts = pool_options::<sqlx::Sqlite>(spec);
    if path == ":memory:" {
        pool_opts = pool_opts.max_connections(1).min_connections(1);
    }
    let pool = pool_opts
        .connect_with(options)
        .await
        .map_err(|e| DbError::connection(format!("failed to connect: {}", e)))?;

    ping_pool(&pool, "sqlite").await?;
    Ok(pool)
}

fn pool_options<DB: sqlx::Database>(spec: &ConnectionSpec) -> sqlx::pool::PoolOptions<DB> {
    sqlx::pool::PoolOptions::<DB>::new()
        .max_connections(spec.max_open_conns.unwrap_or(25))
        .min_connections(spec.max_idle_conns.unwrap_or(5))
        .max_lifetime(spec.conn_max_lifetime.map(Duration::from_secs))
        .idle_timeout(spec.conn_max_idle_time.map(Duration::from_secs))
        .acquire_timeout(Duration::from_secs(spec.connect_timeout_secs() as u64))
}

async fn ping_pool<DB>(pool: &sqlx::Pool<DB>, dialect: &str) -> DbResult<()>
where
    DB: sqlx::Database,
{
    let ping = async {
        let mut conn = pool.acquire().await?;
        conn.ping().await?;
        Ok::<_, sqlx::Error>(())
    };
    match timeout(PING_TIMEOUT, ping).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(DbError::connection(format!(
            "failed to ping {} database: {}",
            dialect, e
        ))),
        Err(_) => Err(DbError::timeout(
            format!("{} ping", dialect),
            PING_TIMEOUT.as_secs(),
        )),
    }
}

/// SQLite performance pragmas; failures are logged, never fatal.
async fn apply_sqlite_pragmas(pool: &SqlitePool, spec: &ConnectionSpec) {
    let mut pragmas = Vec::new();
    if let Some(cache) = spec.cache_size.filter(|c| *c > 0) {
        pragmas.push(format!("PRAGMA cache_size = {}", cache));
    }
    pragmas.push("PRAGMA synchronous = NORMAL".to_string());
    pragmas.push("PRAGMA temp_store = MEMORY".to_string());
    pragmas.push("PRAGMA mmap_size = 268435456".to_string());

    for pragma in pragmas {
        if let Err(e) = sqlx::query(&pragma).execute(pool).await {
            warn!(pragma = %pragma, error = %e, "failed to apply SQLite pragma");
        } else {
            debug!(pragma = %pragma, "applied SQLite pragma");
        }
    }
}

fn pg_ssl_mode(mode: Option<SslMode>) -> PgSslMode {
    match mode.unwrap_or(SslMode::Disable) {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
        SslMode::Prefer => PgSslMode::Prefer,
    }
}

fn sqlite_journal_mode(mode: Option<JournalMode>) -> SqliteJournalMode {
    match mode.unwrap_or(JournalMode::Wal) {
        JournalMode::Delete => SqliteJournalMode::Delete,
        JournalMode::Truncate => SqliteJournalMode::Truncate,
        JournalMode::Persist => SqliteJournalMode::Persist,
        JournalMode::Wal => SqliteJournalMode::Wal,
        JournalMode::Off => SqliteJournalMode::Off,
    }
}
