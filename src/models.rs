//! Data shared by the coordinator, the wire protocol and the client.
//!
//! Everything serialises as camelCase JSON so browser clients can consume it
//! unchanged.

use serde::{Deserialize, Serialize};

pub type ConnectionId = String;
pub type RoomId = String;
pub type BreakoutRoomId = String;
pub type FileId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Online,
    Offline,
}

/// A participant, bound to one live connection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub room_id: RoomId,
    pub breakout_room_id: Option<BreakoutRoomId>,
    pub is_master: bool,
    pub connection_id: ConnectionId,
    pub status: UserStatus,
    pub typing: bool,
    pub cursor_position: u64,
}

impl User {
    /// Workspace the user currently edits: the breakout room if any, else the room.
    pub fn active_workspace(&self) -> &str {
        self.breakout_room_id.as_deref().unwrap_or(&self.room_id)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub id: FileId,
    pub name: String,
    #[serde(default)]
    pub content: String,
    /// Bumped by the coordinator on every accepted content update.
    #[serde(default)]
    pub revision: u64,
}

impl File {
    pub fn new(id: impl Into<FileId>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), content: content.into(), revision: 0 }
    }
}

/// Full workspace state, delivered wholesale on (re)join.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSnapshot {
    pub files: Vec<File>,
    pub current_file: Option<File>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BreakoutRoomView {
    pub id: BreakoutRoomId,
    pub name: String,
    pub parent_room_id: RoomId,
    pub users: Vec<User>,
}

/// Read-only room overview served over HTTP.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub room_id: RoomId,
    pub master: Option<String>,
    pub users: Vec<User>,
    pub breakout_rooms: Vec<BreakoutRoomView>,
}
