//! Participant side of the protocol.
//!
//! - [`connection`]: WebSocket transport with ack correlation
//! - [`debounce`]: keystroke coalescing and typing expiry
//! - [`reconcile`]: revision-based merge of incoming updates
//! - [`editor`]: the three above wired into one editing session

pub mod connection;
pub mod debounce;
pub mod editor;
pub mod reconcile;

pub use connection::SessionClient;
pub use debounce::{Debouncer, TypingIndicator};
pub use editor::EditorSession;
pub use reconcile::{Applied, LocalWorkspace};
