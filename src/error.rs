use axum::{http::StatusCode, response::IntoResponse};
use std::fmt::Display;

pub type AppResult<T> = Result<T, AppErr>;
pub type SessionResult<T> = Result<T, SessionErr>;

/* ── service shell: config, io, http routes ── */
#[derive(thiserror::Error, Debug)]
pub enum AppErr {
    #[error("Bad request: {0}")]
    Bad(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config: {0}")]
    Config(#[from] envy::Error),
}

impl IntoResponse for AppErr {
    fn into_response(self) -> axum::response::Response {
        let (code, body) = match self {
            AppErr::Bad(msg)      => (StatusCode::BAD_REQUEST, msg),
            AppErr::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other                 => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        };
        (code, body).into_response()
    }
}

/* ── session rejections: surfaced as `{error}` inside the ack ── */
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionErr {
    /// Missing or malformed identifiers, duplicate ids, wrong membership.
    #[error("{0}")]
    Invalid(String),

    #[error("Join a room first")]
    NotJoined,

    #[error("Username already exists in this room")]
    DuplicateUsername,

    /// Non-master calling a master-only operation.
    #[error("Not allowed")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("A file named \"{0}\" already exists")]
    NameTaken(String),
}

/* ── client side ── */
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("WebSocket: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("connection closed")]
    Closed,

    /// The coordinator answered the request with `{error}`.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("username already exists in this room")]
    UsernameExists,
}

pub type ClientResult<T> = Result<T, ClientError>;

/* ── helpers ── */
pub fn bad<E: Display>(e: E) -> AppErr { AppErr::Bad(e.to_string()) }

pub fn invalid<E: Display>(e: E) -> SessionErr { SessionErr::Invalid(e.to_string()) }
