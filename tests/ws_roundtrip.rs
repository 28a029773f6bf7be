//! End-to-end over a real socket: axum server on an ephemeral port, clients
//! through `SessionClient` / `EditorSession`.

use std::time::{Duration, Instant};

use collab_server::{
    client::{Applied, EditorSession, SessionClient},
    error::ClientError,
    protocol::{AckResult, ClientEvent, ParentRoomRef, ServerEvent},
    routes,
    session::Coordinator,
    state::SharedHub,
};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

async fn spawn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::router(SharedHub::new(Coordinator::default()));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

async fn session(url: &str) -> EditorSession {
    EditorSession::new(SessionClient::connect(url).await.unwrap())
}

async fn joined(url: &str, room: &str, name: &str) -> EditorSession {
    let mut s = session(url).await;
    timeout(WAIT, s.join(room, name)).await.unwrap().unwrap();
    s
}

/// Pull events until one matches, failing after `WAIT`.
async fn wait_for<F>(s: &mut EditorSession, mut pred: F) -> ServerEvent
where
    F: FnMut(&ServerEvent) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = s.next_event().await.expect("connection closed");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn join_assigns_master_and_rejects_duplicates() {
    let url = spawn_server().await;
    let mut alice = joined(&url, "room-1", "alice").await;
    let bob = joined(&url, "room-1", "bob").await;

    assert!(alice.user().unwrap().is_master);
    assert!(!bob.user().unwrap().is_master);
    assert_eq!(bob.users().len(), 2);

    let event = wait_for(&mut alice, |e| matches!(e, ServerEvent::UserJoined(_))).await;
    assert!(matches!(event, ServerEvent::UserJoined(p) if p.user.username == "bob"));
    assert_eq!(alice.users().len(), 2);

    let mut impostor = session(&url).await;
    let err = timeout(WAIT, impostor.join("room-1", "alice")).await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::UsernameExists));

    let mut short = session(&url).await;
    let err = timeout(WAIT, short.join("r1", "carol")).await.unwrap().unwrap_err();
    assert!(matches!(err, ClientError::Rejected(msg) if msg.contains("Room id")));
}

#[tokio::test]
async fn breakout_lifecycle() {
    let url = spawn_server().await;
    let mut alice = joined(&url, "room-1", "alice").await;
    let mut bob = joined(&url, "room-1", "bob").await;

    let err = bob.create_breakout_room("Team 1").await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected(msg) if msg == "Not allowed"));

    let id = alice.create_breakout_room("Team 1").await.unwrap();
    let rooms = alice
        .client()
        .request_ok(ClientEvent::GetBreakoutRooms(ParentRoomRef { parent_room_id: "room-1".into() }))
        .await
        .unwrap();
    assert!(matches!(rooms, AckResult::Rooms { rooms } if rooms.len() == 1 && rooms[0].name == "Team 1"));

    bob.enter_breakout_room(&id).await.unwrap();
    let event = wait_for(&mut bob, |e| matches!(e, ServerEvent::BreakoutRoomJoined(_))).await;
    assert!(matches!(event, ServerEvent::BreakoutRoomJoined(r) if r.users.len() == 1 && r.users[0].username == "bob"));
    assert_eq!(bob.user().unwrap().breakout_room_id.as_deref(), Some(id.as_str()));
    wait_for(&mut bob, |e| matches!(e, ServerEvent::SyncFiles(_))).await;
    assert_eq!(bob.workspace().files().count(), 0);

    alice.close_breakout_room(&id).await.unwrap();
    wait_for(&mut bob, |e| matches!(e, ServerEvent::BreakoutRoomClosed(_))).await;
    assert_eq!(bob.user().unwrap().breakout_room_id, None);
}

#[tokio::test]
async fn edits_propagate_without_echo() {
    let url = spawn_server().await;
    let mut alice = joined(&url, "room-1", "alice").await;
    let mut bob = joined(&url, "room-1", "bob").await;

    let id = alice.create_file("main.rs").await.unwrap();
    wait_for(&mut bob, |e| matches!(e, ServerEvent::FileCreated(_))).await;
    assert_eq!(bob.workspace().file(&id).unwrap().name, "main.rs");

    alice.edit(&id, "fn main() {}", 12, Instant::now()).unwrap();
    assert_eq!(alice.flush_all().await.unwrap(), 1);

    let update = wait_for(&mut bob, |e| matches!(e, ServerEvent::FileUpdated(_))).await;
    assert!(matches!(&update, ServerEvent::FileUpdated(p) if p.file.revision == 1));
    assert_eq!(bob.workspace().file(&id).unwrap().content, "fn main() {}");

    bob.edit(&id, "fn main() { run() }", 19, Instant::now()).unwrap();
    assert_eq!(bob.flush_all().await.unwrap(), 1);

    // the first update alice ever sees is bob's, never her own
    let update = wait_for(&mut alice, |e| matches!(e, ServerEvent::FileUpdated(_))).await;
    assert!(matches!(&update, ServerEvent::FileUpdated(p) if p.file.revision == 2));
    assert_eq!(alice.apply(&update), Some(Applied::Stale));
    assert_eq!(alice.workspace().file(&id).unwrap().content, "fn main() { run() }");
}

#[tokio::test]
async fn debounced_edit_waits_for_quiet_period() {
    let url = spawn_server().await;
    let mut alice = joined(&url, "room-1", "alice").await;
    let id = alice.create_file("notes.md").await.unwrap();

    let start = Instant::now();
    alice.edit(&id, "a", 1, start).unwrap();
    alice.edit(&id, "ab", 2, start + Duration::from_millis(100)).unwrap();

    assert_eq!(alice.flush(start + Duration::from_millis(200)).await.unwrap(), 0);
    assert_eq!(alice.flush(start + Duration::from_millis(450)).await.unwrap(), 1);
    assert!(!alice.workspace().is_busy(&id));
    assert_eq!(alice.workspace().file(&id).unwrap().revision, 1);
}
