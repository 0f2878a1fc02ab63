//! Configuration: CLI flags, environment, and the connection list.
//!
//! Connection sources, in precedence order: an explicit config file path, an
//! inline JSON argument, the `DB_CONFIG` environment variable, and finally
//! the legacy single-database `DB_*` variables. The first source yielding a
//! non-empty connection list wins; exhausting all sources is a configuration
//! error.

use crate::error::{DbError, DbResult};
use crate::mcp::DEFAULT_SERVER_NAME;
use crate::models::{ConnectionSpec, DatabaseType, MultiDbConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, warn};

/// Default SSE listen port.
pub const DEFAULT_SSE_PORT: u16 = 9092;

/// Default SSE listen host.
pub const DEFAULT_SSE_HOST: &str = "localhost";

/// Transport mode for the RPC surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Line-delimited JSON-RPC on standard I/O
    #[default]
    Stdio,
    /// Server-Sent Events + HTTP POST
    Sse,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Sse => write!(f, "sse"),
        }
    }
}

/// Multi-database MCP gateway.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "multidb-mcp-server",
    about = "MCP gateway exposing query, transaction and schema tools over many SQL databases",
    version
)]
pub struct Config {
    /// Transport mode (sse or stdio)
    #[arg(short = 't', long = "transport", value_enum, default_value_t, env = "TRANSPORT_MODE")]
    pub transport: TransportMode,

    /// SSE listen port
    #[arg(long = "port", default_value_t = DEFAULT_SSE_PORT)]
    pub port: u16,

    /// SSE listen host
    #[arg(long = "host", default_value = DEFAULT_SSE_HOST)]
    pub host: String,

    /// Path to a JSON config file with a "connections" array
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Inline JSON config literal (same format as the config file)
    #[arg(long = "db-config", value_name = "JSON")]
    pub db_config: Option<String>,

    /// Open pools on first use instead of at startup
    #[arg(long = "lazy", env = "MCP_LAZY_LOADING")]
    pub lazy: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Resolve the connection list from the configured sources.
    pub fn load_connections(&self) -> DbResult<Vec<ConnectionSpec>> {
        // 1. Explicit config file.
        if let Some(path) = &self.config_file {
            match std::fs::read_to_string(path) {
                Ok(data) => {
                    if let Some(connections) = parse_config(&data, &path.display().to_string()) {
                        info!(path = %path.display(), "loaded database config from file");
                        return Ok(connections);
                    }
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read config file");
                }
            }
        }

        // 2. Inline JSON argument.
        if let Some(literal) = self.db_config.as_deref().filter(|s| !s.is_empty()) {
            if let Some(connections) = parse_config(literal, "--db-config") {
                info!("loaded database config from inline argument");
                return Ok(connections);
            }
        }

        // 3. DB_CONFIG environment variable.
        if let Ok(literal) = std::env::var("DB_CONFIG") {
            if !literal.is_empty() {
                if let Some(connections) = parse_config(&literal, "DB_CONFIG") {
                    info!("loaded database config from DB_CONFIG environment variable");
                    return Ok(connections);
                }
            }
        }

        // 4. Legacy single-connection environment variables.
        if let Some(spec) = legacy_env_connection() {
            info!("created database config from legacy environment variables");
            return Ok(vec![spec]);
        }

        Err(DbError::config("no database configuration provided"))
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_config(data: &str, source: &str) -> Option<Vec<ConnectionSpec>> {
    match serde_json::from_str::<MultiDbConfig>(data) {
        Ok(config) if !config.connections.is_empty() => Some(config.connections),
        Ok(_) => None,
        Err(e) => {
            warn!(source = %source, error = %e, "failed to parse database config");
            None
        }
    }
}

fn legacy_env_connection() -> Option<ConnectionSpec> {
    let host = std::env::var("DB_HOST").ok().filter(|s| !s.is_empty())?;
    let user = std::env::var("DB_USER").ok().filter(|s| !s.is_empty())?;

    let db_type = std::env::var("DB_TYPE")
        .ok()
        .and_then(|t| DatabaseType::parse(&t))
        .unwrap_or(DatabaseType::MySql);
    let port = std::env::var("DB_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(3306);

    let mut spec = ConnectionSpec::new("default", db_type);
    spec.host = host;
    spec.port = Some(port);
    spec.user = user;
    spec.password = std::env::var("DB_PASSWORD").unwrap_or_default();
    spec.name = std::env::var("DB_NAME").unwrap_or_default();
    Some(spec)
}

/// Tool-name prefix, from `MCP_SERVER_NAME` with a fixed default.
pub fn server_name() -> String {
    std::env::var("MCP_SERVER_NAME")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string())
}
