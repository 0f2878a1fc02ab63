//! Process bootstrap.
//!
//! Exit codes: 0 clean shutdown, 1 configuration or startup failure,
//! 2 fatal runtime error after start.

use clap::Parser;
use multidb_mcp_server::config::{self, Config, TransportMode};
use multidb_mcp_server::db::{ConnectionManager, TransactionRegistry};
use multidb_mcp_server::mcp::{Dispatcher, ToolFactory};
use multidb_mcp_server::tools::PerformanceAnalyzer;
use multidb_mcp_server::transport::{SseTransport, StdioTransport, Transport};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    // Diagnostics go to stderr; stdout belongs to the protocol stream.
    let subscriber = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let config = Config::parse();
    init_tracing(&config);

    let specs = match config.load_connections() {
        Ok(specs) => specs,
        Err(e) => {
            error!(error = %e, "configuration failure");
            std::process::exit(1);
        }
    };

    info!(
        transport = %config.transport,
        databases = specs.len(),
        lazy = config.lazy,
        "starting multidb MCP server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let manager = Arc::new(ConnectionManager::new());
    if let Err(e) = manager.load_config(specs).await {
        error!(error = %e, "invalid database configuration");
        std::process::exit(1);
    }
    if config.lazy {
        manager.set_lazy_loading(true).await;
    }
    if let Err(e) = manager.connect().await {
        error!(error = %e, "failed to connect to databases");
        manager.close_all().await;
        std::process::exit(1);
    }

    let registry = Arc::new(TransactionRegistry::new());
    let analyzer = Arc::new(PerformanceAnalyzer::new());
    let db_ids = manager.list_databases().await;
    let factory = Arc::new(ToolFactory::new(
        config::server_name(),
        manager.clone(),
        registry,
        analyzer,
        &db_ids,
    ));
    let dispatcher = Arc::new(Dispatcher::new(factory));

    let result = match config.transport {
        TransportMode::Stdio => {
            StdioTransport::new(dispatcher, manager.clone()).run().await
        }
        TransportMode::Sse => {
            SseTransport::new(dispatcher, manager.clone(), config.host.clone(), config.port)
                .run()
                .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "fatal runtime error");
        std::process::exit(2);
    }

    info!("server shutdown complete");
}
