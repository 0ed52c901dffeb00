//! Server assembly: wires the hub, WebSocket listener, and snapshot API.
//!
//! Each accepted connection gets a fresh id from a monotonic counter and a
//! dedicated task; the hub actor is the only place registry and backlog
//! state lives.

use crate::api;
use crate::config::RelayConfig;
use crate::hub::RelayHub;
use crate::transport::websocket;
use intake_core::{RelayError, RelayResult};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// The intake relay server instance.
pub struct RelayServer {
    config: RelayConfig,
    /// Monotonic connection id counter.
    next_conn_id: AtomicU64,
}

impl RelayServer {
    /// Create a new server instance from resolved configuration.
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            next_conn_id: AtomicU64::new(1),
        }
    }

    /// Start the hub and both listeners, then relay until a listener stops.
    pub async fn run(self) -> RelayResult<()> {
        let ws_addr: SocketAddr = format!("{}:{}", self.config.bind_addr, self.config.ws_port)
            .parse()
            .map_err(|e| RelayError::Other(format!("invalid address: {e}")))?;
        let http_addr: SocketAddr = format!("{}:{}", self.config.bind_addr, self.config.http_port)
            .parse()
            .map_err(|e| RelayError::Other(format!("invalid address: {e}")))?;

        let hub = RelayHub::spawn();

        let mut ws_rx = websocket::start_listener(ws_addr).await?;
        let mut api_task = tokio::spawn(api::serve(http_addr, hub.clone()));

        info!(ws = %ws_addr, http = %http_addr, "intake-server ready");

        loop {
            tokio::select! {
                Some(conn) = ws_rx.recv() => {
                    let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
                    tokio::spawn(websocket::run_connection(conn, id, hub.clone()));
                }
                result = &mut api_task => {
                    return match result {
                        Ok(outcome) => outcome,
                        Err(e) => Err(RelayError::Other(format!("snapshot API task failed: {e}"))),
                    };
                }
                else => {
                    info!("all listeners closed, shutting down");
                    return Ok(());
                }
            }
        }
    }
}
