//! intake-server: patient intake relay.
//!
//! Accepts WebSocket connections from patient and staff clients, broadcasts
//! every envelope to all connected peers, and serves the backlog of accepted
//! submissions over a polling HTTP endpoint for late-joining staff.

mod api;
mod backlog;
mod config;
mod hub;
mod registry;
mod server;
mod transport;

use clap::Parser;
use config::RelayConfig;
use server::RelayServer;
use std::path::PathBuf;
use tracing::{error, info};

/// intake-server — patient intake relay
#[derive(Parser, Debug)]
#[command(name = "intake-server", version, about = "Patient intake relay server")]
struct Cli {
    /// WebSocket listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Snapshot API (HTTP) port
    #[arg(long)]
    http_port: Option<u16>,

    /// Config file path
    #[arg(long, default_value = "intake.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    // Load server config (file + env + CLI overrides)
    let config_path = PathBuf::from(&cli.config);
    let config = match RelayConfig::load(Some(&config_path), cli.port, cli.http_port) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load config");
            std::process::exit(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ws_port = config.ws_port,
        http_port = config.http_port,
        "starting intake-server"
    );

    let relay = RelayServer::new(config);

    // Run until shutdown signal
    tokio::select! {
        result = relay.run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                std::process::exit(1);
            }
        }
        _ = shutdown_signal() => {
            info!("received shutdown signal");
        }
    }

    info!("intake-server stopped");
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
}
