//! Event/acknowledgment protocol spoken over the WebSocket.
//!
//! Client frames: `{"event": "FILE_UPDATED", "data": {...}, "ack": 7}`.
//! Server frames: `{"event": "FILE_UPDATED", "data": {...}}`; replies to a
//! request carrying `ack` arrive as `{"event": "ACK", "data": {"ack": 7, ...}}`.

use serde::{Deserialize, Serialize};

use crate::models::{
    BreakoutRoomId, BreakoutRoomView, ConnectionId, File, FileId, RoomId, User,
    WorkspaceSnapshot,
};

/* ───────────── payloads ───────────── */

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub room_id: RoomId,
    pub username: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateBreakoutRoom {
    pub parent_room_id: RoomId,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParentRoomRef {
    pub parent_room_id: RoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BreakoutRoomRef {
    pub breakout_room_id: BreakoutRoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SwitchBreakoutRoom {
    pub from: BreakoutRoomId,
    pub to: BreakoutRoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignToBreakoutRoom {
    pub connection_id: ConnectionId,
    pub breakout_room_id: BreakoutRoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FilePayload {
    pub file: File,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FileRef {
    pub id: FileId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TypingStart {
    #[serde(default)]
    pub cursor_position: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub message: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserPayload {
    pub user: User,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RoomRoster {
    pub user: User,
    pub users: Vec<User>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BreakoutRoomsList {
    pub rooms: Vec<BreakoutRoomView>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BreakoutRoomClosed {
    pub breakout_room_id: BreakoutRoomId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssignedToBreakoutRoom {
    pub breakout_room_id: BreakoutRoomId,
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRef {
    pub connection_id: ConnectionId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

/* ───────────── client → server ───────────── */

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientEvent {
    JoinRequest(JoinRequest),
    CreateBreakoutRoom(CreateBreakoutRoom),
    GetBreakoutRooms(ParentRoomRef),
    JoinBreakoutRoom(BreakoutRoomRef),
    LeaveBreakoutRoom(BreakoutRoomRef),
    SwitchBreakoutRoom(SwitchBreakoutRoom),
    AssignToBreakoutRoom(AssignToBreakoutRoom),
    CloseBreakoutRoom(BreakoutRoomRef),
    SyncFiles(WorkspaceSnapshot),
    FileCreated(FilePayload),
    FileUpdated(FilePayload),
    FileRenamed(FilePayload),
    FileDeleted(FileRef),
    UserOnline,
    UserOffline,
    TypingStart(TypingStart),
    TypingPause,
    SendMessage(ChatMessage),
}

impl ClientEvent {
    /// Event name as it appears on the wire, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRequest(_)          => "JOIN_REQUEST",
            ClientEvent::CreateBreakoutRoom(_)   => "CREATE_BREAKOUT_ROOM",
            ClientEvent::GetBreakoutRooms(_)     => "GET_BREAKOUT_ROOMS",
            ClientEvent::JoinBreakoutRoom(_)     => "JOIN_BREAKOUT_ROOM",
            ClientEvent::LeaveBreakoutRoom(_)    => "LEAVE_BREAKOUT_ROOM",
            ClientEvent::SwitchBreakoutRoom(_)   => "SWITCH_BREAKOUT_ROOM",
            ClientEvent::AssignToBreakoutRoom(_) => "ASSIGN_TO_BREAKOUT_ROOM",
            ClientEvent::CloseBreakoutRoom(_)    => "CLOSE_BREAKOUT_ROOM",
            ClientEvent::SyncFiles(_)            => "SYNC_FILES",
            ClientEvent::FileCreated(_)          => "FILE_CREATED",
            ClientEvent::FileUpdated(_)          => "FILE_UPDATED",
            ClientEvent::FileRenamed(_)          => "FILE_RENAMED",
            ClientEvent::FileDeleted(_)          => "FILE_DELETED",
            ClientEvent::UserOnline              => "USER_ONLINE",
            ClientEvent::UserOffline             => "USER_OFFLINE",
            ClientEvent::TypingStart(_)          => "TYPING_START",
            ClientEvent::TypingPause             => "TYPING_PAUSE",
            ClientEvent::SendMessage(_)          => "SEND_MESSAGE",
        }
    }
}

/// One inbound frame: the event plus an optional acknowledgment id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Inbound {
    #[serde(flatten)]
    pub event: ClientEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
}

impl Inbound {
    pub fn new(event: ClientEvent) -> Self { Self { event, ack: None } }

    pub fn with_ack(event: ClientEvent, ack: u64) -> Self { Self { event, ack: Some(ack) } }
}

/* ───────────── server → client ───────────── */

/// Result carried inside an `ACK`. Variant order matters for decoding.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AckResult {
    Error { error: String },
    Created { id: BreakoutRoomId, name: String },
    Rooms { rooms: Vec<BreakoutRoomView> },
    Revision { success: bool, revision: u64 },
    Success { success: bool },
}

impl AckResult {
    pub fn ok() -> Self { AckResult::Success { success: true } }

    pub fn is_ok(&self) -> bool { !matches!(self, AckResult::Error { .. }) }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Ack {
    pub ack: u64,
    #[serde(flatten)]
    pub result: AckResult,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    Ack(Ack),
    Error(ErrorBody),
    JoinAccepted(JoinAccepted),
    UsernameExists,
    UserJoined(UserPayload),
    UserDisconnected(UserPayload),
    BreakoutRoomsList(BreakoutRoomsList),
    BreakoutRoomJoined(RoomRoster),
    BreakoutRoomLeft(RoomRoster),
    BreakoutRoomClosed(BreakoutRoomClosed),
    AssignedToBreakoutRoom(AssignedToBreakoutRoom),
    SyncFiles(WorkspaceSnapshot),
    FileCreated(FilePayload),
    FileUpdated(FilePayload),
    FileRenamed(FilePayload),
    FileDeleted(FileRef),
    UserOnline(ConnectionRef),
    UserOffline(ConnectionRef),
    TypingStart(UserPayload),
    TypingPause(UserPayload),
    ReceiveMessage(ChatMessage),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JoinAccepted {
    pub user: User,
    pub users: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inbound_with_ack_decodes() {
        let raw = json!({
            "event": "JOIN_REQUEST",
            "data": { "roomId": "room-1", "username": "alice" },
            "ack": 4
        });
        let frame: Inbound = serde_json::from_value(raw).unwrap();
        assert_eq!(frame.ack, Some(4));
        assert_eq!(
            frame.event,
            ClientEvent::JoinRequest(JoinRequest { room_id: "room-1".into(), username: "alice".into() })
        );
    }

    #[test]
    fn test_unit_event_without_data() {
        let frame: Inbound = serde_json::from_str(r#"{"event":"TYPING_PAUSE"}"#).unwrap();
        assert_eq!(frame.event, ClientEvent::TypingPause);
        assert_eq!(frame.ack, None);
    }

    #[test]
    fn test_rename_payload_without_content() {
        let raw = r#"{"event":"FILE_RENAMED","data":{"file":{"id":"f1","name":"main.rs"}}}"#;
        let frame: Inbound = serde_json::from_str(raw).unwrap();
        match frame.event {
            ClientEvent::FileRenamed(p) => {
                assert_eq!(p.file.name, "main.rs");
                assert_eq!(p.file.content, "");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_ack_is_flat_on_the_wire() {
        let ev = ServerEvent::Ack(Ack {
            ack: 9,
            result: AckResult::Created { id: "breakout_1_abc".into(), name: "Team 1".into() },
        });
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v, json!({
            "event": "ACK",
            "data": { "ack": 9, "id": "breakout_1_abc", "name": "Team 1" }
        }));
    }

    #[test]
    fn test_ack_result_decoding_order() {
        let ok: AckResult = serde_json::from_value(json!({ "success": true, "revision": 3 })).unwrap();
        assert_eq!(ok, AckResult::Revision { success: true, revision: 3 });

        let err: AckResult = serde_json::from_value(json!({ "error": "Not allowed" })).unwrap();
        assert!(!err.is_ok());

        let plain: AckResult = serde_json::from_value(json!({ "success": true })).unwrap();
        assert_eq!(plain, AckResult::ok());
    }

    #[test]
    fn test_unit_server_event() {
        let v = serde_json::to_value(&ServerEvent::UsernameExists).unwrap();
        assert_eq!(v, json!({ "event": "USERNAME_EXISTS" }));
    }
}
