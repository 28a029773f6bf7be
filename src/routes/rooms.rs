//! Read-only HTTP introspection of live sessions.
use axum::{
    extract::{Extension, Path},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    error::{bad, AppErr, AppResult},
    models::RoomSummary,
    state::SharedHub,
};

pub fn router() -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/rooms/:room_id", get(room))
}

async fn health(Extension(hub): Extension<SharedHub>) -> Json<Value> {
    Json(json!({ "status": "ok", "connections": hub.connection_count().await }))
}

async fn room(
    Extension(hub): Extension<SharedHub>,
    Path(room_id): Path<String>,
) -> AppResult<Json<RoomSummary>> {
    if room_id.trim().is_empty() {
        return Err(bad("room id is required"));
    }
    hub.room_summary(&room_id)
        .await
        .map(Json)
        .ok_or_else(|| AppErr::NotFound(format!("room {room_id}")))
}
