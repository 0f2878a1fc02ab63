//! Use-case layer: the stateless operations the tools expose.

pub mod format;
pub mod list;
pub mod performance;
pub mod query;
pub mod schema;
pub mod transaction;

pub use performance::PerformanceAnalyzer;
pub use query::QueryTools;
pub use schema::{SchemaComponent, SchemaTools};
pub use transaction::TransactionTools;
