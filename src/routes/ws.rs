use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, Extension},
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::info;

use crate::{state::SharedHub, utils::ids};

pub fn router() -> Router {
    Router::new().route("/ws", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(hub): Extension<SharedHub>,
) -> impl IntoResponse {
    ws.on_upgrade(move |sock| peer_ws(sock, hub))
}

/* ---------------- per connection ---------------- */
async fn peer_ws(sock: WebSocket, hub: SharedHub) {
    let conn = ids::connection_id();
    info!(conn = %conn, "connection opened");

    let (mut sink, mut stream) = sock.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    hub.attach(&conn, tx).await;

    // hub → socket
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // socket → hub; binary and ping frames are ignored
    let recv_hub = hub.clone();
    let recv_conn = conn.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(raw) => recv_hub.handle_text(&recv_conn, &raw).await,
                Message::Close(_)  => break,
                _                  => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    hub.detach(&conn).await;
    info!(conn = %conn, "connection closed");
}
