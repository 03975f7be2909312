//! Reverse-proxy load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!  Client ──▶ http (axum) ──▶ intake queue ──▶ Dispatcher ──▶ BackendClient ──▶ Backend
//!                 │               (bounded)        │               │             /process
//!                 │                                │               │
//!                 │                          Strategy::select   activeConnections gauge
//!                 │                                │               │
//!                 ▼                                ▼               ▼
//!            /stats, /serversHealth  ◀────────  MetricsStore (memory | redis)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use lb_proxy::config::load_config;
use lb_proxy::lifecycle::{self, signals, Shutdown};
use lb_proxy::observability;

#[derive(Parser)]
#[command(name = "lb-proxy")]
#[command(about = "HTTP load balancer with pluggable dispatch strategies", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    observability::logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "lb-proxy starting");
    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        algorithm = %config.pool.algorithm,
        backends = config.pool.backends.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    let proxy = lifecycle::start(&config, listener, shutdown.clone()).await?;
    tracing::info!(address = %proxy.local_addr, "Listening for connections");

    tokio::spawn(signals::shutdown_on_signal(shutdown));

    proxy.wait().await?;
    tracing::info!("Shutdown complete");
    Ok(())
}
