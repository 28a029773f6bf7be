use std::time::Instant;

use tracing::debug;

use crate::{
    client::{
        connection::SessionClient,
        debounce::{Debouncer, TypingIndicator, EDIT_DEBOUNCE, TYPING_IDLE},
        reconcile::{Applied, LocalWorkspace},
    },
    error::{ClientError, ClientResult},
    models::{BreakoutRoomId, File, FileId, User},
    protocol::*,
};

/// One participant's editing session: local workspace mirror, debounced
/// outbound edits and reconciliation of everything the coordinator sends.
pub struct EditorSession {
    client: SessionClient,
    workspace: LocalWorkspace,
    edits: Debouncer<FileId>,
    typing: TypingIndicator,
    me: Option<User>,
    users: Vec<User>,
}

impl EditorSession {
    pub fn new(client: SessionClient) -> Self {
        Self {
            client,
            workspace: LocalWorkspace::default(),
            edits: Debouncer::new(EDIT_DEBOUNCE),
            typing: TypingIndicator::new(TYPING_IDLE),
            me: None,
            users: Vec::new(),
        }
    }

    pub fn workspace(&self) -> &LocalWorkspace {
        &self.workspace
    }

    pub fn user(&self) -> Option<&User> {
        self.me.as_ref()
    }

    /// Everyone in the parent room as last reported by the coordinator.
    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    /// Join a room and wait for the initial snapshot.
    pub async fn join(&mut self, room_id: &str, username: &str) -> ClientResult<User> {
        self.client.emit(ClientEvent::JoinRequest(JoinRequest {
            room_id: room_id.to_string(),
            username: username.to_string(),
        }))?;

        loop {
            let event = self.client.next_event().await.ok_or(ClientError::Closed)?;
            match event {
                ServerEvent::UsernameExists => return Err(ClientError::UsernameExists),
                ServerEvent::Error(e) => return Err(ClientError::Rejected(e.error)),
                ServerEvent::SyncFiles(_) => {
                    self.apply(&event);
                    return self.me.clone().ok_or(ClientError::Closed);
                }
                other => {
                    self.apply(&other);
                }
            }
        }
    }

    /* ---------------- breakout rooms ---------------- */

    pub async fn create_breakout_room(&mut self, name: &str) -> ClientResult<BreakoutRoomId> {
        let parent_room_id = self.room_id()?;
        match self.client.request_ok(ClientEvent::CreateBreakoutRoom(CreateBreakoutRoom {
            parent_room_id,
            name: name.to_string(),
        })).await? {
            AckResult::Created { id, .. } => Ok(id),
            other => Err(ClientError::Rejected(format!("unexpected reply {other:?}"))),
        }
    }

    /// Enter a breakout room; switches atomically when already in another one.
    pub async fn enter_breakout_room(&mut self, id: &str) -> ClientResult<()> {
        self.flush_all().await?;
        let event = match self.breakout_room_id() {
            Some(from) if from == id => return Ok(()),
            Some(from) => ClientEvent::SwitchBreakoutRoom(SwitchBreakoutRoom { from, to: id.to_string() }),
            None => ClientEvent::JoinBreakoutRoom(BreakoutRoomRef { breakout_room_id: id.to_string() }),
        };
        self.client.request_ok(event).await?;
        self.set_breakout(Some(id.to_string()));
        Ok(())
    }

    pub async fn leave_breakout_room(&mut self) -> ClientResult<()> {
        let Some(id) = self.breakout_room_id() else { return Ok(()) };
        self.flush_all().await?;
        self.client
            .request_ok(ClientEvent::LeaveBreakoutRoom(BreakoutRoomRef { breakout_room_id: id }))
            .await?;
        self.set_breakout(None);
        Ok(())
    }

    pub async fn close_breakout_room(&mut self, id: &str) -> ClientResult<()> {
        self.client
            .request_ok(ClientEvent::CloseBreakoutRoom(BreakoutRoomRef { breakout_room_id: id.to_string() }))
            .await
            .map(|_| ())
    }

    /* ---------------- files ---------------- */

    /// Create an empty file, suffixing the name until it is unique locally.
    pub async fn create_file(&mut self, name: &str) -> ClientResult<FileId> {
        let mut candidate = name.to_string();
        let mut n = 1;
        while self.workspace.has_name(&candidate) {
            candidate = format!("{name} ({n})");
            n += 1;
        }
        let file = File::new(uuid::Uuid::new_v4().to_string(), candidate, "");
        let id = file.id.clone();
        self.workspace.insert(file.clone());
        self.client.request_ok(ClientEvent::FileCreated(FilePayload { file })).await?;
        Ok(id)
    }

    pub fn open_file(&mut self, id: &str) -> bool {
        self.workspace.open(id)
    }

    /// Local keystroke: update the buffer now, send later.
    pub fn edit(&mut self, id: &str, content: &str, cursor_position: u64, now: Instant) -> ClientResult<()> {
        if !self.workspace.edit(id, content) {
            return Err(ClientError::Rejected(format!("File {id} not found")));
        }
        self.edits.touch(id.to_string(), now);
        self.typing.keystroke(now);
        self.client.emit(ClientEvent::TypingStart(TypingStart { cursor_position }))
    }

    /// Send every edit whose quiet period is over; emits `TYPING_PAUSE`
    /// once typing went idle. Returns the number of updates sent.
    pub async fn flush(&mut self, now: Instant) -> ClientResult<usize> {
        if self.typing.poll(now) {
            self.client.emit(ClientEvent::TypingPause)?;
        }
        let due = self.edits.due(now);
        self.send_updates(due).await
    }

    /// Send all pending edits immediately.
    pub async fn flush_all(&mut self) -> ClientResult<usize> {
        let pending = self.edits.drain();
        self.send_updates(pending).await
    }

    async fn send_updates(&mut self, ids: Vec<FileId>) -> ClientResult<usize> {
        let mut sent = 0;
        for id in ids {
            let Some(file) = self.workspace.take_outbound(&id) else { continue };
            match self.client.request(ClientEvent::FileUpdated(FilePayload { file })).await {
                Ok(AckResult::Revision { revision, .. }) => {
                    self.workspace.confirm(&id, revision);
                    sent += 1;
                }
                Ok(AckResult::Error { error }) => {
                    self.workspace.fail(&id);
                    return Err(ClientError::Rejected(error));
                }
                Ok(_) => {
                    self.workspace.confirm(&id, 0);
                    sent += 1;
                }
                Err(e) => {
                    self.workspace.fail(&id);
                    return Err(e);
                }
            }
        }
        Ok(sent)
    }

    /// Rename after a local collision check; `false` if the name is taken.
    pub async fn rename_file(&mut self, id: &str, new_name: &str) -> ClientResult<bool> {
        if self.workspace.has_name(new_name) {
            return Ok(false);
        }
        let file = File::new(id, new_name, "");
        match self.client.request_ok(ClientEvent::FileRenamed(FilePayload { file })).await {
            Ok(_) => Ok(self.workspace.rename(id, new_name)),
            Err(ClientError::Rejected(msg)) => {
                debug!(file = id, "rename refused: {msg}");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete_file(&mut self, id: &str) -> ClientResult<()> {
        self.edits.cancel(&id.to_string());
        self.client
            .request_ok(ClientEvent::FileDeleted(FileRef { id: id.to_string() }))
            .await?;
        self.workspace.remove(id);
        Ok(())
    }

    /// Push the whole local workspace, e.g. after switching the active file.
    pub async fn push_snapshot(&mut self) -> ClientResult<()> {
        self.client
            .request_ok(ClientEvent::SyncFiles(self.workspace.snapshot()))
            .await
            .map(|_| ())
    }

    /* ---------------- incoming ---------------- */

    /// Wait for the next event and fold it into local state.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        let event = self.client.next_event().await?;
        self.apply(&event);
        Some(event)
    }

    /// Fold one event into local state. Returns the reconciliation outcome
    /// for content updates.
    pub fn apply(&mut self, event: &ServerEvent) -> Option<Applied> {
        match event {
            ServerEvent::JoinAccepted(a) => {
                self.me = Some(a.user.clone());
                self.users = a.users.clone();
            }
            ServerEvent::UserJoined(p) => self.users.push(p.user.clone()),
            ServerEvent::UserDisconnected(p) => {
                self.users.retain(|u| u.connection_id != p.user.connection_id)
            }
            ServerEvent::TypingStart(p) | ServerEvent::TypingPause(p) => {
                if let Some(u) = self.users.iter_mut().find(|u| u.connection_id == p.user.connection_id) {
                    *u = p.user.clone();
                }
            }
            ServerEvent::AssignedToBreakoutRoom(a) => self.set_breakout(Some(a.breakout_room_id.clone())),
            ServerEvent::BreakoutRoomClosed(c) => {
                if self.breakout_room_id().as_deref() == Some(c.breakout_room_id.as_str()) {
                    self.set_breakout(None);
                }
            }
            ServerEvent::SyncFiles(snapshot) => self.workspace.apply_snapshot(snapshot),
            ServerEvent::FileCreated(p) => {
                self.workspace.apply_created(&p.file);
            }
            ServerEvent::FileRenamed(p) => {
                self.workspace.apply_renamed(&p.file);
            }
            ServerEvent::FileDeleted(r) => {
                self.edits.cancel(&r.id);
                self.workspace.apply_deleted(&r.id);
            }
            ServerEvent::FileUpdated(p) => {
                let outcome = self.workspace.apply_update(&p.file);
                debug!(file = %p.file.id, revision = p.file.revision, ?outcome, "remote update");
                return Some(outcome);
            }
            _ => {}
        }
        None
    }

    /* ---------------- helpers ---------------- */

    fn room_id(&self) -> ClientResult<String> {
        self.me.as_ref().map(|u| u.room_id.clone()).ok_or(ClientError::Closed)
    }

    fn breakout_room_id(&self) -> Option<BreakoutRoomId> {
        self.me.as_ref().and_then(|u| u.breakout_room_id.clone())
    }

    /// Track the active workspace; the coordinator's snapshot repopulates it.
    fn set_breakout(&mut self, id: Option<BreakoutRoomId>) {
        if let Some(me) = self.me.as_mut() {
            if me.breakout_room_id != id {
                me.breakout_room_id = id;
                self.workspace.reset();
                self.edits.drain();
            }
        }
    }
}
