//! Transport layer: byte streams carrying JSON-RPC frames.
//!
//! Two implementations: line-delimited stdio for CLI clients, and an SSE
//! stream paired with an HTTP POST endpoint for web clients.

pub mod sse;
pub mod stdio;

pub use sse::SseTransport;
pub use stdio::StdioTransport;

use crate::error::DbResult;
use std::future::Future;

/// A transport serves JSON-RPC frames until shut down.
pub trait Transport: Send + Sync {
    /// Run until EOF or a shutdown signal.
    fn run(&self) -> impl Future<Output = DbResult<()>> + Send;

    /// Transport name for logging.
    fn name(&self) -> &'static str;
}
