//! Distributed circuit breaker gateway
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                  BREAKER GATEWAY                 │
//!   Client Request   │  ┌────────┐   ┌─────────────┐   ┌─────────────┐  │
//!   ─────────────────┼─▶│  http  │──▶│ shared flag │──▶│   local     │  │
//!                    │  │ server │   │   (store)   │   │  breaker    │  │
//!                    │  └────────┘   └──────┬──────┘   └──────┬──────┘  │
//!                    │                      │                 │         │
//!                    │                      ▼                 ▼         │
//!   Client Response  │  ┌────────┐   ┌─────────────┐   ┌─────────────┐  │
//!   ◀────────────────┼──│response│◀──│ classifier  │◀──│ downstream  │◀─┼── Dependency
//!                    │  └────────┘   └─────────────┘   └─────────────┘  │
//!                    └──────────────────────────┬───────────────────────┘
//!                                               │ circuit:<name>:open
//!                                               ▼
//!                                            Redis
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use breaker_gateway::config::{self, loader, GatewayConfig};
use breaker_gateway::http::HttpServer;
use breaker_gateway::lifecycle::{signals, startup, Shutdown};
use breaker_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "breaker-gateway")]
#[command(about = "HTTP gateway guarding dependencies with a distributed circuit breaker")]
struct Args {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => {
            let mut config = GatewayConfig::default();
            loader::finalize(&mut config)?;
            config
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "breaker-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        dependencies = config.dependencies.len(),
        shared_store_enabled = config.shared_store.enabled,
        lease_secs = config.shared_store.lease_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let gateway = startup::build_gateway(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(signals::listen_for_shutdown(shutdown.clone()));

    let server = HttpServer::new(config, gateway);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
