//! WebSocket transport using tokio-tungstenite.
//!
//! The listener accepts TCP connections, performs the WebSocket handshake on
//! a separate task, and hands accepted connections to the server loop
//! through a channel. `run_connection` then drives one connection for its
//! whole lifetime: hub broadcasts out to the socket, inbound text frames
//! into the hub.

use crate::hub::RelayHub;
use crate::registry::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use intake_core::{RelayError, RelayResult};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// A handle to an accepted WebSocket connection.
pub struct WebSocketConnection {
    /// The WebSocket stream (split into sink + stream in usage).
    pub ws_stream: tokio_tungstenite::WebSocketStream<TcpStream>,
    /// Remote address.
    pub remote_addr: SocketAddr,
}

/// Maximum accepted text frame size (1 MiB).
const MAX_FRAME_SIZE: usize = 1_048_576;

/// Capacity of one connection's outbound frame channel.
const OUTBOUND_CAPACITY: usize = 64;

/// Start the WebSocket listener.
///
/// Returns a receiver that yields accepted connections. A failed handshake
/// affects only the connection that attempted it.
pub async fn start_listener(
    bind_addr: SocketAddr,
) -> RelayResult<mpsc::Receiver<WebSocketConnection>> {
    let tcp_listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| RelayError::Transport(format!("WS bind failed: {e}")))?;

    info!(addr = %bind_addr, "WebSocket listener started");

    let (tx, rx) = mpsc::channel::<WebSocketConnection>(64);

    tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, addr)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        match tokio_tungstenite::accept_async(stream).await {
                            Ok(ws_stream) => {
                                debug!(remote = %addr, "WebSocket connection accepted");
                                let conn = WebSocketConnection {
                                    ws_stream,
                                    remote_addr: addr,
                                };
                                if tx.send(conn).await.is_err() {
                                    warn!("WebSocket connection channel closed");
                                }
                            }
                            Err(e) => {
                                warn!(remote = %addr, error = %e, "WebSocket handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    });

    Ok(rx)
}

/// Drive one accepted connection until it closes.
///
/// Registers the connection with the hub, pumps frames both ways, and
/// notifies the hub exactly when the connection leaves the live set —
/// regardless of which half failed first.
pub async fn run_connection(conn: WebSocketConnection, id: ConnectionId, hub: RelayHub) {
    let remote = conn.remote_addr;
    let (mut ws_sink, mut ws_source) = conn.ws_stream.split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

    hub.connected(id, outbound_tx).await;
    info!(conn = id, remote = %remote, "client connected");

    loop {
        tokio::select! {
            Some(raw) = outbound_rx.recv() => {
                if let Err(e) = ws_sink.send(Message::Text(raw)).await {
                    debug!(conn = id, error = %e, "WS send failed, closing");
                    break;
                }
            }

            frame = ws_source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_FRAME_SIZE {
                            warn!(conn = id, len = text.len(), "frame too large, dropped");
                            continue;
                        }
                        hub.inbound(id, text).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = ws_sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(conn = id, "client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames are not part of the protocol.
                        continue;
                    }
                    Some(Err(e)) => {
                        debug!(conn = id, error = %e, "WS receive failed");
                        break;
                    }
                }
            }
        }
    }

    hub.disconnected(id).await;
    info!(conn = id, remote = %remote, "client disconnected");
}
