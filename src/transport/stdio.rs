//! Stdio transport: one JSON-RPC frame per line.
//!
//! Requests are read line-by-line from stdin and handled on their own tasks;
//! responses are serialized through a writer task so concurrent handlers
//! never interleave bytes on stdout. Diagnostics go to stderr via tracing,
//! never to the protocol stream.

use crate::db::ConnectionManager;
use crate::error::DbResult;
use crate::mcp::Dispatcher;
use crate::transport::Transport;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub struct StdioTransport {
    dispatcher: Arc<Dispatcher>,
    manager: Arc<ConnectionManager>,
}

impl StdioTransport {
    pub fn new(dispatcher: Arc<Dispatcher>, manager: Arc<ConnectionManager>) -> Self {
        Self {
            dispatcher,
            manager,
        }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("starting stdio transport");

        let (out_tx, mut out_rx) = mpsc::channel::<String>(64);

        // Single writer keeps responses line-atomic.
        let writer = tokio::spawn(async move {
            let mut stdout = tokio::io::stdout();
            while let Some(line) = out_rx.recv().await {
                if stdout.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdout.write_all(b"\n").await.is_err() {
                    break;
                }
                if stdout.flush().await.is_err() {
                    break;
                }
            }
        });

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            let line = line.trim().to_string();
                            if line.is_empty() {
                                continue;
                            }
                            let dispatcher = self.dispatcher.clone();
                            let out_tx = out_tx.clone();
                            // Long-running handlers must not block the reader.
                            tokio::spawn(async move {
                                if let Some(response) = dispatcher.handle_frame(&line).await {
                                    match serde_json::to_string(&response) {
                                        Ok(json) => {
                                            let _ = out_tx.send(json).await;
                                        }
                                        Err(e) => {
                                            error!(error = %e, "failed to serialize response");
                                        }
                                    }
                                }
                            });
                        }
                        Ok(None) => {
                            info!("stdin closed, shutting down");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "error reading stdin");
                            break;
                        }
                    }
                }
                _ = wait_for_signal() => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        drop(out_tx);
        let _ = writer.await;
        self.manager.close_all().await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

/// Wait for SIGINT or SIGTERM.
pub(crate) async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
