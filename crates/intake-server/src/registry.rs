//! Live set of open connections known to the hub.
//!
//! Owned exclusively by the hub actor; connection tasks only ever hold the
//! receiving half of their own outbound channel.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Unique identifier for an accepted connection (process-wide monotonic).
pub type ConnectionId = u64;

/// Outbound handle for one registered connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Sender feeding raw frames to the connection's writer half.
    pub outbound: mpsc::Sender<String>,
}

/// Registry of currently-open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Register a newly accepted connection. Duplicate ids are rejected.
    pub fn add(&mut self, handle: ConnectionHandle) -> bool {
        let id = handle.id;
        if self.connections.contains_key(&id) {
            warn!(conn = id, "duplicate connection id, add ignored");
            return false;
        }
        self.connections.insert(id, handle);
        debug!(conn = id, total = self.connections.len(), "connection registered");
        true
    }

    /// Deregister a connection. Removing an absent id is a no-op; close
    /// detection can race between the reader and writer halves.
    pub fn remove(&mut self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            debug!(conn = id, total = self.connections.len(), "connection removed");
        }
    }

    /// Fan a raw frame out to every registered connection.
    ///
    /// Sends are fire-and-forget: a closed or saturated outbound channel is
    /// skipped without affecting the remaining targets. Returns the number
    /// of connections the frame was handed to.
    pub fn broadcast(&self, raw: &str) -> usize {
        let mut delivered = 0;
        for handle in self.connections.values() {
            match handle.outbound.try_send(raw.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(conn = handle.id, "outbound channel full, frame dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(conn = handle.id, "outbound channel closed, frame dropped");
                }
            }
        }
        delivered
    }

    /// Identifiers of all registered connections.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: ConnectionId) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(4);
        (ConnectionHandle { id, outbound: tx }, rx)
    }

    #[test]
    fn add_and_remove() {
        let mut registry = ConnectionRegistry::new();
        let (h, _rx) = handle(1);
        assert!(registry.add(h));
        assert_eq!(registry.len(), 1);
        registry.remove(1);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut registry = ConnectionRegistry::new();
        let (a, _rx_a) = handle(7);
        let (b, _rx_b) = handle(7);
        assert!(registry.add(a));
        assert!(!registry.add(b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = ConnectionRegistry::new();
        let (h, _rx) = handle(3);
        registry.add(h);
        registry.remove(3);
        registry.remove(3);
        registry.remove(99);
        assert!(registry.is_empty());
    }

    #[test]
    fn broadcast_reaches_all_open_connections() {
        let mut registry = ConnectionRegistry::new();
        let (a, mut rx_a) = handle(1);
        let (b, mut rx_b) = handle(2);
        registry.add(a);
        registry.add(b);

        assert_eq!(registry.broadcast("frame"), 2);
        assert_eq!(rx_a.try_recv().unwrap(), "frame");
        assert_eq!(rx_b.try_recv().unwrap(), "frame");
    }

    #[test]
    fn closed_target_is_skipped() {
        let mut registry = ConnectionRegistry::new();
        let (a, mut rx_a) = handle(1);
        let (b, rx_b) = handle(2);
        registry.add(a);
        registry.add(b);
        drop(rx_b);

        assert_eq!(registry.broadcast("frame"), 1);
        assert_eq!(rx_a.try_recv().unwrap(), "frame");
    }

    #[test]
    fn full_target_is_skipped() {
        let mut registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        registry.add(ConnectionHandle { id: 1, outbound: tx });

        assert_eq!(registry.broadcast("first"), 1);
        assert_eq!(registry.broadcast("second"), 0);
        assert_eq!(rx.try_recv().unwrap(), "first");
    }
}
