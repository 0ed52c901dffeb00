//! Snapshot HTTP API for late-joining staff clients.
//!
//! Read-only endpoints over the hub: the submission backlog as of the
//! request, a liveness probe, and the connected-peer listing. Runs on its
//! own listener, outside the live WebSocket channel.

use crate::hub::RelayHub;
use crate::registry::ConnectionId;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use intake_core::{RelayError, RelayResult};
use serde::Serialize;
use serde_json::Value;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub hub: RelayHub,
}

/// Body of `GET /api/patient-list`.
#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    /// Accepted submission payloads in arrival order.
    pub entries: Vec<Value>,
}

/// Body of `GET /api/peers`.
#[derive(Debug, Serialize)]
pub struct PeersResponse {
    pub count: usize,
    pub ids: Vec<ConnectionId>,
}

/// Build the snapshot API router.
pub fn router(hub: RelayHub) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/patient-list", get(patient_list))
        .route("/api/peers", get(peers))
        .with_state(ApiState { hub })
}

/// Serve the snapshot API on the given address until the process exits.
pub async fn serve(bind_addr: SocketAddr, hub: RelayHub) -> RelayResult<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| RelayError::Transport(format!("HTTP bind failed: {e}")))?;
    info!(addr = %bind_addr, "snapshot API listening");
    axum::serve(listener, router(hub))
        .await
        .map_err(|e| RelayError::Transport(format!("HTTP server failed: {e}")))
}

/// Liveness probe.
async fn health() -> impl IntoResponse {
    "OK"
}

/// Full backlog of accepted submissions; empty when none have occurred.
async fn patient_list(State(state): State<ApiState>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        entries: state.hub.snapshot().await,
    })
}

/// Currently connected peers.
async fn peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let ids = state.hub.peers().await;
    Json(PeersResponse {
        count: ids.len(),
        ids,
    })
}
