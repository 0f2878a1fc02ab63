//! MCP protocol layer: wire types, tool factory, and request dispatch.

pub mod factory;
pub mod handler;
pub mod types;

pub use factory::{DEFAULT_SERVER_NAME, ToolFactory};
pub use handler::Dispatcher;
