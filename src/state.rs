use std::{collections::HashMap, sync::Arc};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use crate::{
    models::{ConnectionId, RoomSummary},
    protocol::{ErrorBody, Inbound, ServerEvent},
    session::{Coordinator, Delivery},
};

/// Outbound queue of one connection (serialized JSON frames).
pub type Tx = mpsc::UnboundedSender<String>;

/* ------------ coordinator + outbound queues ------------ */
pub struct Hub {
    coordinator: Coordinator,
    peers: HashMap<ConnectionId, Tx>,
}

impl Hub {
    fn dispatch(&self, deliveries: Vec<Delivery>) {
        for Delivery { to, event } in deliveries {
            let Some(tx) = self.peers.get(&to) else {
                debug!(conn = %to, "dropping event for gone connection");
                continue;
            };
            match serde_json::to_string(&event) {
                Ok(text) => { tx.send(text).ok(); }
                Err(e)   => warn!(conn = %to, "failed to encode event: {e}"),
            }
        }
    }
}

/// The one coarse lock: every event is handled and fanned out while holding
/// it, so registries see strictly serialized access.
#[derive(Clone)]
pub struct SharedHub(Arc<Mutex<Hub>>);

impl SharedHub {
    pub fn new(coordinator: Coordinator) -> Self {
        Self(Arc::new(Mutex::new(Hub { coordinator, peers: HashMap::new() })))
    }

    pub async fn attach(&self, conn: &str, tx: Tx) {
        self.0.lock().await.peers.insert(conn.to_string(), tx);
    }

    /// Parse and handle one text frame from `conn`.
    pub async fn handle_text(&self, conn: &str, raw: &str) {
        let mut hub = self.0.lock().await;
        let deliveries = match serde_json::from_str::<Inbound>(raw) {
            Ok(frame) => hub.coordinator.handle(conn, frame),
            Err(e) => {
                warn!(conn, "malformed frame: {e}");
                vec![Delivery {
                    to: conn.to_string(),
                    event: ServerEvent::Error(ErrorBody { error: format!("Malformed message: {e}") }),
                }]
            }
        };
        hub.dispatch(deliveries);
    }

    /// Forget the connection's queue, then let the coordinator announce it.
    pub async fn detach(&self, conn: &str) {
        let mut hub = self.0.lock().await;
        hub.peers.remove(conn);
        let deliveries = hub.coordinator.disconnect(conn);
        hub.dispatch(deliveries);
    }

    pub async fn room_summary(&self, room_id: &str) -> Option<RoomSummary> {
        self.0.lock().await.coordinator.room_summary(room_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.0.lock().await.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn next_json(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
        serde_json::from_str(&rx.try_recv().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_frame_answers_error() {
        let hub = SharedHub::new(Coordinator::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.attach("c1", tx).await;

        hub.handle_text("c1", "not json").await;
        let v = next_json(&mut rx);
        assert_eq!(v["event"], "ERROR");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_and_detach_fan_out() {
        let hub = SharedHub::new(Coordinator::default());
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.attach("c1", tx1).await;
        hub.attach("c2", tx2).await;

        let join = |name: &str| {
            json!({ "event": "JOIN_REQUEST", "data": { "roomId": "room-1", "username": name } }).to_string()
        };
        hub.handle_text("c1", &join("alice")).await;
        assert_eq!(next_json(&mut rx1)["event"], "JOIN_ACCEPTED");
        assert_eq!(next_json(&mut rx1)["event"], "SYNC_FILES");

        hub.handle_text("c2", &join("bob")).await;
        let joined = next_json(&mut rx1);
        assert_eq!(joined["event"], "USER_JOINED");
        assert_eq!(joined["data"]["user"]["username"], "bob");
        assert_eq!(next_json(&mut rx2)["data"]["user"]["isMaster"], false);

        hub.detach("c1").await;
        assert_eq!(hub.connection_count().await, 1);
        next_json(&mut rx2); // SYNC_FILES from the join
        let gone = next_json(&mut rx2);
        assert_eq!(gone["event"], "USER_DISCONNECTED");
        assert_eq!(gone["data"]["user"]["username"], "alice");
    }
}
