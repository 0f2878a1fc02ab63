//! Data models shared across the server.

pub mod connection;
pub mod query;

pub use connection::{ConnectionSpec, DatabaseType, JournalMode, MultiDbConfig, SslMode};
pub use query::{ExecOutcome, QueryParam};
