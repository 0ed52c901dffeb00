//! Relay hub: the single serialization point for relay state.
//!
//! Connection tasks submit events through one ordered channel; a single
//! actor task owns the registry and backlog and processes events one at a
//! time. If submission A is enqueued before submission B, A is appended to
//! the backlog and broadcast before B — on every receiving connection.
//!
//! `RelayHub` is the public handle (cheap to clone); `HubActor` owns all
//! state and is never touched from outside its task.

use crate::backlog::BacklogStore;
use crate::registry::{ConnectionHandle, ConnectionId, ConnectionRegistry};
use intake_core::Envelope;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Capacity of the hub's event channel.
const HUB_EVENT_CAPACITY: usize = 256;

/// Events delivered to the hub actor.
enum HubEvent {
    /// A connection completed its handshake and can receive frames.
    Connected {
        id: ConnectionId,
        outbound: mpsc::Sender<String>,
    },
    /// A raw text frame arrived on a connection.
    Inbound { id: ConnectionId, raw: String },
    /// A connection closed or failed.
    Disconnected { id: ConnectionId },
    /// Request for the full submission backlog.
    Snapshot { reply: oneshot::Sender<Vec<Value>> },
    /// Request for the ids of currently registered connections.
    Peers {
        reply: oneshot::Sender<Vec<ConnectionId>>,
    },
}

/// Handle to the relay hub actor. Cheap to clone.
#[derive(Clone)]
pub struct RelayHub {
    event_tx: mpsc::Sender<HubEvent>,
}

impl RelayHub {
    /// Spawn the hub actor and return a handle to it.
    pub fn spawn() -> Self {
        let (event_tx, event_rx) = mpsc::channel(HUB_EVENT_CAPACITY);
        tokio::spawn(HubActor::new().run(event_rx));
        Self { event_tx }
    }

    /// Announce a newly accepted connection together with its outbound sender.
    pub async fn connected(&self, id: ConnectionId, outbound: mpsc::Sender<String>) {
        let _ = self
            .event_tx
            .send(HubEvent::Connected { id, outbound })
            .await;
    }

    /// Submit a raw inbound frame received on a connection.
    pub async fn inbound(&self, id: ConnectionId, raw: String) {
        let _ = self.event_tx.send(HubEvent::Inbound { id, raw }).await;
    }

    /// Announce that a connection closed. Safe to call more than once.
    pub async fn disconnected(&self, id: ConnectionId) {
        let _ = self.event_tx.send(HubEvent::Disconnected { id }).await;
    }

    /// Fetch the ordered backlog of accepted submissions.
    ///
    /// Routed through the actor, so the result reflects every event the hub
    /// processed before this request. Empty when no submissions occurred.
    pub async fn snapshot(&self) -> Vec<Value> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .event_tx
            .send(HubEvent::Snapshot { reply: reply_tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }

    /// Ids of all currently registered connections.
    pub async fn peers(&self) -> Vec<ConnectionId> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .event_tx
            .send(HubEvent::Peers { reply: reply_tx })
            .await
            .is_err()
        {
            return Vec::new();
        }
        reply_rx.await.unwrap_or_default()
    }
}

/// The actor task. Exclusive owner of the registry and the backlog.
struct HubActor {
    registry: ConnectionRegistry,
    backlog: BacklogStore,
}

impl HubActor {
    fn new() -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            backlog: BacklogStore::new(),
        }
    }

    async fn run(mut self, mut event_rx: mpsc::Receiver<HubEvent>) {
        info!("relay hub started");
        while let Some(event) = event_rx.recv().await {
            self.handle(event);
        }
        debug!("relay hub stopped, all handles dropped");
    }

    fn handle(&mut self, event: HubEvent) {
        match event {
            HubEvent::Connected { id, outbound } => {
                self.registry.add(ConnectionHandle { id, outbound });
            }
            HubEvent::Inbound { id, raw } => self.process_frame(id, &raw),
            HubEvent::Disconnected { id } => self.registry.remove(id),
            HubEvent::Snapshot { reply } => {
                let _ = reply.send(self.backlog.snapshot());
            }
            HubEvent::Peers { reply } => {
                let _ = reply.send(self.registry.ids());
            }
        }
    }

    /// Process one inbound frame: parse, persist submissions, broadcast.
    ///
    /// The original raw text is broadcast verbatim — sender included — so
    /// every peer renders from identical bytes and the sender gets a receipt
    /// echo. A parse failure drops the frame for this connection only.
    fn process_frame(&mut self, id: ConnectionId, raw: &str) {
        let envelope = match Envelope::decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(conn = id, error = %e, "dropping malformed frame");
                return;
            }
        };

        if envelope.is_submission() {
            self.backlog.append(envelope.payload);
            debug!(conn = id, backlog = self.backlog.len(), "submission appended");
        }

        let delivered = self.registry.broadcast(raw);
        debug!(conn = id, tag = %envelope.tag, delivered, "frame broadcast");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    async fn connect(hub: &RelayHub, id: ConnectionId) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(16);
        hub.connected(id, tx).await;
        rx
    }

    #[tokio::test]
    async fn submission_is_persisted_and_broadcast_to_all() {
        let hub = RelayHub::spawn();
        let mut c1 = connect(&hub, 1).await;
        let mut c2 = connect(&hub, 2).await;

        let raw = r#"{"type":"PATIENT_FORM","payload":{"firstName":"Ann"}}"#;
        hub.inbound(1, raw.to_string()).await;

        assert_eq!(hub.snapshot().await, vec![json!({"firstName": "Ann"})]);
        assert_eq!(c1.recv().await.unwrap(), raw);
        assert_eq!(c2.recv().await.unwrap(), raw);
    }

    #[tokio::test]
    async fn backlog_order_matches_arrival_order() {
        let hub = RelayHub::spawn();
        let mut c1 = connect(&hub, 1).await;

        for i in 0..10 {
            let raw = format!(r#"{{"type":"PATIENT_FORM","payload":{{"seq":{i}}}}}"#);
            hub.inbound(1, raw).await;
        }

        let snap = hub.snapshot().await;
        assert_eq!(snap.len(), 10);
        for (i, entry) in snap.iter().enumerate() {
            assert_eq!(entry, &json!({ "seq": i }));
        }

        // Broadcasts arrive in the same order on the receiving side.
        for i in 0..10 {
            let frame = c1.recv().await.unwrap();
            assert!(frame.contains(&format!(r#""seq":{i}"#)));
        }
    }

    #[tokio::test]
    async fn unknown_tag_is_broadcast_but_not_persisted() {
        let hub = RelayHub::spawn();
        let mut c1 = connect(&hub, 1).await;
        let mut c2 = connect(&hub, 2).await;

        let form = r#"{"type":"PATIENT_FORM","payload":{"firstName":"Ann"}}"#;
        hub.inbound(1, form.to_string()).await;

        let ping = r#"{"type":"PING"}"#;
        hub.inbound(2, ping.to_string()).await;

        // Backlog unchanged by the ping.
        assert_eq!(hub.snapshot().await, vec![json!({"firstName": "Ann"})]);

        assert_eq!(c1.recv().await.unwrap(), form);
        assert_eq!(c1.recv().await.unwrap(), ping);
        assert_eq!(c2.recv().await.unwrap(), form);
        assert_eq!(c2.recv().await.unwrap(), ping);
    }

    #[tokio::test]
    async fn malformed_frame_is_dropped_without_side_effects() {
        let hub = RelayHub::spawn();
        let mut c1 = connect(&hub, 1).await;

        hub.inbound(1, "this is not json".to_string()).await;

        // Snapshot doubles as an ordering barrier: the hub has processed the
        // malformed frame once it replies.
        assert!(hub.snapshot().await.is_empty());
        assert_eq!(c1.try_recv().unwrap_err(), TryRecvError::Empty);

        // The connection stays usable afterwards.
        let raw = r#"{"type":"PATIENT_FORM","payload":{"firstName":"Ann"}}"#;
        hub.inbound(1, raw.to_string()).await;
        assert_eq!(c1.recv().await.unwrap(), raw);
    }

    #[tokio::test]
    async fn disconnect_is_idempotent() {
        let hub = RelayHub::spawn();
        let mut c1 = connect(&hub, 1).await;
        let _c2 = connect(&hub, 2).await;

        hub.disconnected(2).await;
        hub.disconnected(2).await;

        assert_eq!(hub.peers().await, vec![1]);

        let raw = r#"{"type":"PING"}"#;
        hub.inbound(1, raw.to_string()).await;
        assert_eq!(c1.recv().await.unwrap(), raw);
    }

    #[tokio::test]
    async fn dead_peer_does_not_block_broadcast() {
        let hub = RelayHub::spawn();
        let mut c1 = connect(&hub, 1).await;
        let c2 = connect(&hub, 2).await;

        // Peer 2 goes away without the hub hearing about it yet.
        drop(c2);

        let raw = r#"{"type":"PATIENT_FORM","payload":{"firstName":"Ann"}}"#;
        hub.inbound(1, raw.to_string()).await;

        assert_eq!(c1.recv().await.unwrap(), raw);
        assert_eq!(hub.snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn snapshot_is_empty_before_any_submission() {
        let hub = RelayHub::spawn();
        assert!(hub.snapshot().await.is_empty());
        assert!(hub.peers().await.is_empty());
    }

    #[tokio::test]
    async fn mixed_traffic_scenario() {
        // The end-to-end exchange from the original deployment: a patient
        // submits a form, then a staff client probes with a ping.
        let hub = RelayHub::spawn();
        let mut patient = connect(&hub, 1).await;
        let mut staff = connect(&hub, 2).await;

        let form = r#"{"type":"PATIENT_FORM","payload":{"firstName":"Ann"}}"#;
        hub.inbound(1, form.to_string()).await;
        assert_eq!(patient.recv().await.unwrap(), form);
        assert_eq!(staff.recv().await.unwrap(), form);
        assert_eq!(hub.snapshot().await, vec![json!({"firstName": "Ann"})]);

        let ping = r#"{"type":"PING"}"#;
        hub.inbound(2, ping.to_string()).await;
        assert_eq!(patient.recv().await.unwrap(), ping);
        assert_eq!(staff.recv().await.unwrap(), ping);
        assert_eq!(hub.snapshot().await.len(), 1);
    }
}
