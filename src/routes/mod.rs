use axum::{Extension, Router};

use crate::state::SharedHub;

pub mod rooms;
pub mod ws;

pub fn router(hub: SharedHub) -> Router {
    Router::new()
        .nest("/api", rooms::router())
        .merge(ws::router())
        .layer(Extension(hub))
}
