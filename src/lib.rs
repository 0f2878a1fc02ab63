//! Multi-database MCP gateway.
//!
//! One process holds long-lived pools to many relational databases (MySQL,
//! PostgreSQL, SQLite, Oracle) and publishes a fixed set of tools per
//! database over JSON-RPC: query, execute, transaction control, schema
//! introspection, performance analysis, and table-name filtering. Clients
//! speak line-delimited JSON-RPC on stdio or SSE + HTTP POST.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};
