//! Connection configuration models.
//!
//! A [`ConnectionSpec`] is the declarative record for one database in the
//! connection list. It is parsed from JSON (file, inline argument or
//! environment), validated once, and immutable afterwards.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Default maximum open connections.
pub const DEFAULT_MAX_OPEN_CONNS: u32 = 25;
/// Default maximum idle connections.
pub const DEFAULT_MAX_IDLE_CONNS: u32 = 5;
/// Default connection lifetime in seconds (5 minutes).
pub const DEFAULT_CONN_MAX_LIFETIME_SECS: u64 = 300;
/// Default idle time in seconds (5 minutes).
pub const DEFAULT_CONN_MAX_IDLE_TIME_SECS: u64 = 300;
/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u32 = 10;
/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 30;
/// Default SQLite cache size in pages.
pub const DEFAULT_SQLITE_CACHE_SIZE: i64 = 2000;
/// Default NLS language for Oracle connections.
pub const DEFAULT_ORACLE_NLS_LANG: &str = "AMERICAN_AMERICA.AL32UTF8";

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    MySql,
    /// Includes TimescaleDB
    #[serde(alias = "timescaledb")]
    Postgres,
    Sqlite,
    Oracle,
}

impl DatabaseType {
    /// Parse a dialect tag as it appears in configuration.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_lowercase().as_str() {
            "mysql" => Some(Self::MySql),
            "postgres" | "timescaledb" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            "oracle" => Some(Self::Oracle),
            _ => None,
        }
    }

    /// The tag used in configuration and tool output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
            Self::Oracle => "oracle",
        }
    }

    /// Positional placeholder for this dialect (1-based).
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Self::Postgres => format!("${}", position),
            Self::Oracle => format!(":{}", position),
            Self::MySql | Self::Sqlite => "?".to_string(),
        }
    }

    /// Default server port, where the dialect has one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::Postgres => Some(5432),
            Self::Oracle => Some(1521),
            Self::Sqlite => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// PostgreSQL SSL modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SslMode {
    #[serde(rename = "disable")]
    Disable,
    #[serde(rename = "require")]
    Require,
    #[serde(rename = "verify-ca")]
    VerifyCa,
    #[serde(rename = "verify-full")]
    VerifyFull,
    #[serde(rename = "prefer")]
    Prefer,
}

impl SslMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Require => "require",
            Self::VerifyCa => "verify-ca",
            Self::VerifyFull => "verify-full",
            Self::Prefer => "prefer",
        }
    }
}

/// SQLite journal modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JournalMode {
    Delete,
    Truncate,
    Persist,
    Wal,
    Off,
}

impl JournalMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Persist => "PERSIST",
            Self::Wal => "WAL",
            Self::Off => "OFF",
        }
    }
}

/// Root of the JSON configuration: a list of connections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiDbConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionSpec>,
}

/// Declarative configuration for a single database connection.
///
/// Unknown JSON fields are ignored. Numeric fields accept either a JSON
/// number or a JSON string holding a decimal integer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    #[serde(default)]
    pub host: String,
    #[serde(default, deserialize_with = "de_opt_u16")]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,

    // PostgreSQL options
    #[serde(default)]
    pub ssl_mode: Option<SslMode>,
    #[serde(default)]
    pub ssl_cert: Option<String>,
    #[serde(default)]
    pub ssl_key: Option<String>,
    #[serde(default)]
    pub ssl_root_cert: Option<String>,
    #[serde(default)]
    pub application_name: Option<String>,
    #[serde(default)]
    pub target_session_attrs: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, String>,

    // SQLite options
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default, deserialize_with = "de_opt_i64")]
    pub cache_size: Option<i64>,
    #[serde(default)]
    pub journal_mode: Option<JournalMode>,

    // Oracle options
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub sid: Option<String>,
    #[serde(default)]
    pub wallet_location: Option<String>,
    #[serde(default)]
    pub tns_admin: Option<String>,
    #[serde(default)]
    pub tns_entry: Option<String>,
    #[serde(default)]
    pub edition: Option<String>,
    #[serde(default)]
    pub pooling: bool,
    #[serde(default)]
    pub standby_sessions: bool,
    #[serde(default)]
    pub nls_lang: Option<String>,

    // Timeouts
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub connect_timeout: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub query_timeout: Option<u32>,

    // Pool settings
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub max_open_conns: Option<u32>,
    #[serde(default, deserialize_with = "de_opt_u32")]
    pub max_idle_conns: Option<u32>,
    #[serde(
        default,
        rename = "conn_max_lifetime_seconds",
        deserialize_with = "de_opt_u64"
    )]
    pub conn_max_lifetime: Option<u64>,
    #[serde(
        default,
        rename = "conn_max_idle_time_seconds",
        deserialize_with = "de_opt_u64"
    )]
    pub conn_max_idle_time: Option<u64>,
}

impl ConnectionSpec {
    /// Create a minimal spec; mainly useful in tests.
    pub fn new(id: impl Into<String>, db_type: DatabaseType) -> Self {
        Self {
            id: id.into(),
            db_type,
            host: String::new(),
            port: None,
            user: String::new(),
            password: String::new(),
            name: String::new(),
            ssl_mode: None,
            ssl_cert: None,
            ssl_key: None,
            ssl_root_cert: None,
            application_name: None,
            target_session_attrs: None,
            options: HashMap::new(),
            database_path: None,
            encryption_key: None,
            read_only: false,
            cache_size: None,
            journal_mode: None,
            service_name: None,
            sid: None,
            wallet_location: None,
            tns_admin: None,
            tns_entry: None,
            edition: None,
            pooling: false,
            standby_sessions: false,
            nls_lang: None,
            connect_timeout: None,
            query_timeout: None,
            max_open_conns: None,
            max_idle_conns: None,
            conn_max_lifetime: None,
            conn_max_idle_time: None,
        }
    }

    /// Validate the connection spec. Called once at load time; a failure is fatal.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("database connection ID cannot be empty".to_string());
        }
        if self.db_type == DatabaseType::Sqlite
            && self.database_path.as_deref().unwrap_or("").is_empty()
            && self.name.is_empty()
        {
            return Err(format!(
                "SQLite database {} requires either database_path or name to be specified",
                self.id
            ));
        }
        Ok(())
    }

    /// Fill in dialect defaults for fields the configuration omitted.
    pub fn apply_defaults(&mut self) {
        if self.max_open_conns.is_none() {
            self.max_open_conns = Some(DEFAULT_MAX_OPEN_CONNS);
        }
        if self.max_idle_conns.is_none() {
            self.max_idle_conns = Some(DEFAULT_MAX_IDLE_CONNS);
        }
        if self.conn_max_lifetime.is_none() {
            self.conn_max_lifetime = Some(DEFAULT_CONN_MAX_LIFETIME_SECS);
        }
        if self.conn_max_idle_time.is_none() {
            self.conn_max_idle_time = Some(DEFAULT_CONN_MAX_IDLE_TIME_SECS);
        }

        match self.db_type {
            DatabaseType::Postgres => {
                if self.ssl_mode.is_none() {
                    self.ssl_mode = Some(SslMode::Disable);
                }
            }
            DatabaseType::Oracle => {
                // Legacy configs carry Oracle settings in the options map.
                self.promote_oracle_options();
                if self.port.is_none() {
                    self.port = Some(1521);
                }
                if self.service_name.as_deref().unwrap_or("").is_empty()
                    && self.sid.as_deref().unwrap_or("").is_empty()
                {
                    self.service_name = Some(self.name.clone());
                }
                if self.nls_lang.is_none() {
                    self.nls_lang = Some(DEFAULT_ORACLE_NLS_LANG.to_string());
                }
                // Oracle benefits from a larger pool.
                if self.max_open_conns == Some(DEFAULT_MAX_OPEN_CONNS) {
                    self.max_open_conns = Some(50);
                }
                if self.max_idle_conns == Some(DEFAULT_MAX_IDLE_CONNS) {
                    self.max_idle_conns = Some(10);
                }
                if self.conn_max_lifetime == Some(DEFAULT_CONN_MAX_LIFETIME_SECS) {
                    self.conn_max_lifetime = Some(1800);
                }
            }
            DatabaseType::Sqlite => {
                if self.journal_mode.is_none() {
                    self.journal_mode = Some(JournalMode::Wal);
                }
                if self.cache_size.is_none() {
                    self.cache_size = Some(DEFAULT_SQLITE_CACHE_SIZE);
                }
                if self.database_path.as_deref().unwrap_or("").is_empty() && !self.name.is_empty() {
                    self.database_path = Some(self.name.clone());
                }
            }
            DatabaseType::MySql => {}
        }

        if self.connect_timeout.is_none() {
            self.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT_SECS);
        }
        if self.query_timeout.is_none() {
            self.query_timeout = Some(DEFAULT_QUERY_TIMEOUT_SECS);
        }
    }

    fn promote_oracle_options(&mut self) {
        let take = |opts: &HashMap<String, String>, key: &str| opts.get(key).cloned();
        if self.service_name.is_none() {
            self.service_name = take(&self.options, "service_name");
        }
        if self.sid.is_none() {
            self.sid = take(&self.options, "sid");
        }
        if self.wallet_location.is_none() {
            self.wallet_location = take(&self.options, "wallet_location");
        }
        if self.tns_admin.is_none() {
            self.tns_admin = take(&self.options, "tns_admin");
        }
        if self.tns_entry.is_none() {
            self.tns_entry = take(&self.options, "tns_entry");
        }
        if self.edition.is_none() {
            self.edition = take(&self.options, "edition");
        }
        if let Some(v) = take(&self.options, "pooling") {
            self.pooling = self.pooling || v == "true";
        }
        if let Some(v) = take(&self.options, "standby_sessions") {
            self.standby_sessions = self.standby_sessions || v == "true";
        }
        if self.nls_lang.is_none() {
            self.nls_lang = take(&self.options, "nls_lang");
        }
    }

    /// Effective port, falling back to the dialect default.
    pub fn effective_port(&self) -> u16 {
        self.port
            .or_else(|| self.db_type.default_port())
            .unwrap_or(0)
    }

    /// Effective SQLite path (`database_path`, falling back to `name`).
    pub fn sqlite_path(&self) -> &str {
        match self.database_path.as_deref() {
            Some(p) if !p.is_empty() => p,
            _ => &self.name,
        }
    }

    /// Effective connect timeout in seconds.
    pub fn connect_timeout_secs(&self) -> u32 {
        self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS)
    }

    /// Effective query timeout in seconds.
    pub fn query_timeout_secs(&self) -> u32 {
        self.query_timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS)
    }
}

// JSON numbers in configs arrive as numbers or as decimal strings; both are
// accepted for every numeric field.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(i64),
    Str(String),
}

fn parse_num<E: serde::de::Error>(value: Option<NumOrString>) -> Result<Option<i64>, E> {
    match value {
        None => Ok(None),
        Some(NumOrString::Num(n)) => Ok(Some(n)),
        Some(NumOrString::Str(s)) => {
            if s.is_empty() {
                return Ok(None);
            }
            s.parse::<i64>()
                .map(Some)
                .map_err(|e| E::custom(format!("invalid numeric string {:?}: {}", s, e)))
        }
    }
}

fn de_opt_u16<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u16>, D::Error> {
    let raw = Option::<NumOrString>::deserialize(d)?;
    match parse_num::<D::Error>(raw)? {
        None => Ok(None),
        Some(n) => u16::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("value {} out of range", n))),
    }
}

fn de_opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let raw = Option::<NumOrString>::deserialize(d)?;
    match parse_num::<D::Error>(raw)? {
        None => Ok(None),
        Some(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("value {} out of range", n))),
    }
}

fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let raw = Option::<NumOrString>::deserialize(d)?;
    match parse_num::<D::Error>(raw)? {
        None => Ok(None),
        Some(n) => u64::try_from(n)
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("value {} out of range", n))),
    }
}

fn de_opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let raw = Option::<NumOrString>::deserialize(d)?;
    parse_num::<D::Error>(raw)
}
