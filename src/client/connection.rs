//! WebSocket client speaking the event/ack protocol.
//!
//! A writer task drains an outgoing queue into the socket; a reader task
//! resolves acks through per-request oneshot channels and forwards every other
//! event to the application.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::{
    error::{ClientError, ClientResult},
    protocol::{AckResult, ClientEvent, Inbound, ServerEvent},
};

type PendingAcks = Arc<Mutex<HashMap<u64, oneshot::Sender<AckResult>>>>;

pub struct SessionClient {
    outgoing: mpsc::UnboundedSender<Message>,
    events: mpsc::UnboundedReceiver<ServerEvent>,
    pending: PendingAcks,
    next_ack: AtomicU64,
}

impl SessionClient {
    /// Connect to a coordinator, e.g. `ws://127.0.0.1:5000/ws`.
    pub async fn connect(url: &str) -> ClientResult<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(url).await?;
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<ServerEvent>();
        let pending: PendingAcks = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sink.send(msg).await.is_err() {
                    break;
                }
            }
        });

        let acks = pending.clone();
        tokio::spawn(async move {
            while let Some(Ok(msg)) = stream.next().await {
                let Message::Text(text) = msg else { continue };
                match serde_json::from_str::<ServerEvent>(text.as_str()) {
                    Ok(ServerEvent::Ack(ack)) => {
                        if let Some(tx) = acks.lock().await.remove(&ack.ack) {
                            tx.send(ack.result).ok();
                        } else {
                            debug!(ack = ack.ack, "ack without pending request");
                        }
                    }
                    Ok(event) => {
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("undecodable server frame: {e}"),
                }
            }
            // dropping the senders wakes every waiting request with `Closed`
            acks.lock().await.clear();
        });

        Ok(Self { outgoing: out_tx, events: event_rx, pending, next_ack: AtomicU64::new(1) })
    }

    fn send_frame(&self, frame: &Inbound) -> ClientResult<()> {
        let text = serde_json::to_string(frame)?;
        self.outgoing
            .send(Message::text(text))
            .map_err(|_| ClientError::Closed)
    }

    /// Fire and forget.
    pub fn emit(&self, event: ClientEvent) -> ClientResult<()> {
        self.send_frame(&Inbound::new(event))
    }

    /// Send with an ack id and wait for the coordinator's answer.
    pub async fn request(&self, event: ClientEvent) -> ClientResult<AckResult> {
        let id = self.next_ack.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if let Err(e) = self.send_frame(&Inbound::with_ack(event, id)) {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }
        rx.await.map_err(|_| ClientError::Closed)
    }

    /// Like [`request`](Self::request), with `{error}` turned into `Err`.
    pub async fn request_ok(&self, event: ClientEvent) -> ClientResult<AckResult> {
        match self.request(event).await? {
            AckResult::Error { error } => Err(ClientError::Rejected(error)),
            ok => Ok(ok),
        }
    }

    /// Next non-ack event; `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        self.events.recv().await
    }

    /// Non-blocking variant of [`next_event`](Self::next_event).
    pub fn try_next_event(&mut self) -> Option<ServerEvent> {
        self.events.try_recv().ok()
    }

    pub fn close(&self) -> ClientResult<()> {
        self.outgoing
            .send(Message::Close(None))
            .map_err(|_| ClientError::Closed)
    }
}
