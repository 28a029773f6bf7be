//! Coordinator for multi-user collaborative editing sessions.
//!
//! Users join rooms over a WebSocket, the first joiner becomes the room's
//! sticky master, the master can spin up breakout rooms, and every room or
//! breakout room replicates a small file workspace to its members using
//! last-writer-wins full-content updates.
//!
//! - [`session`]: registries and the event coordinator (no I/O)
//! - [`protocol`]: event/ack frames on the wire
//! - [`state`] / [`routes`]: axum service around the coordinator
//! - [`client`]: tokio client with debounced, echo-free reconciliation

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod protocol;
pub mod routes;
pub mod session;
pub mod state;
pub mod utils {
    pub mod ids;
}
