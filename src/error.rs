//! Error types for the multi-database MCP gateway.
//!
//! One `thiserror` enum realizes the whole domain taxonomy. Domain errors are
//! folded into tool content envelopes at the dispatcher boundary; only
//! configuration and framing failures propagate as protocol-level errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    /// Invalid or missing configuration; fatal at startup.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Pool open or ping failure. Never cached; the next call may retry.
    #[error("connection error: {message}")]
    Connection { message: String },

    /// All candidate catalog queries for a dialect were exhausted.
    #[error("dialect error: {message}")]
    Dialect { message: String },

    /// A driver call failed inside a query, execute or transaction.
    #[error("{operation} failed: {message}")]
    Driver { operation: String, message: String },

    /// Tool argument validation failed.
    #[error("invalid parameters: {message}")]
    Parameter { message: String },

    /// Transaction ID unknown or already terminated.
    #[error("transaction not found: {transaction_id}")]
    TxNotFound { transaction_id: String },

    /// Transaction is in use by another in-flight request.
    #[error("transaction busy: {transaction_id}")]
    TxBusy { transaction_id: String },

    /// Deadline expired before the driver call returned.
    #[error("timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout { operation: String, elapsed_secs: u64 },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn dialect(message: impl Into<String>) -> Self {
        Self::Dialect {
            message: message.into(),
        }
    }

    pub fn driver(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Driver {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn parameter(message: impl Into<String>) -> Self {
        Self::Parameter {
            message: message.into(),
        }
    }

    pub fn tx_not_found(transaction_id: impl Into<String>) -> Self {
        Self::TxNotFound {
            transaction_id: transaction_id.into(),
        }
    }

    pub fn tx_busy(transaction_id: impl Into<String>) -> Self {
        Self::TxBusy {
            transaction_id: transaction_id.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Timeout marker, distinguishing deadline expiry from driver failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let message = match db_err.code() {
                    Some(code) => format!("{} (code {})", db_err.message(), code),
                    None => db_err.message().to_string(),
                };
                DbError::driver("database operation", message)
            }
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 0),
            sqlx::Error::PoolClosed => DbError::connection("connection pool is closed"),
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::connection(format!("protocol error: {}", msg)),
            other => DbError::driver("database operation", other.to_string()),
        }
    }
}

impl From<oracle::Error> for DbError {
    fn from(err: oracle::Error) -> Self {
        DbError::driver("oracle operation", err.to_string())
    }
}

impl From<r2d2::Error> for DbError {
    fn from(err: r2d2::Error) -> Self {
        DbError::connection(err.to_string())
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
