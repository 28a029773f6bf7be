//! Session coordinator: validates inbound events against the registries,
//! mutates the stores and computes who has to hear about it.
//!
//! The coordinator does no I/O. Each call returns the [`Delivery`] list for
//! the transport to push out, which keeps every event handled to completion
//! before the next one starts.

pub mod breakout;
pub mod connections;
pub mod masters;
pub mod workspace;

use tracing::{debug, info};

use crate::{
    error::{invalid, SessionErr, SessionResult},
    models::{ConnectionId, RoomSummary, User, UserStatus, WorkspaceSnapshot},
    protocol::*,
};
use breakout::{BreakoutRoom, BreakoutRoomRegistry};
use connections::ConnectionRegistry;
use masters::RoomMasterRegistry;
use workspace::FileWorkspaceStore;

/// One outbound event addressed to one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnectionId,
    pub event: ServerEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub min_username_len: usize,
    pub min_room_id_len: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self { min_username_len: 3, min_room_id_len: 5 }
    }
}

#[derive(Default)]
struct Outbox(Vec<Delivery>);

impl Outbox {
    fn send(&mut self, to: &str, event: ServerEvent) {
        self.0.push(Delivery { to: to.to_string(), event });
    }

    fn fan_out<'a, I>(&mut self, targets: I, event: ServerEvent)
    where
        I: IntoIterator<Item = &'a User>,
    {
        for user in targets {
            self.send(&user.connection_id, event.clone());
        }
    }
}

#[derive(Debug, Default)]
pub struct Coordinator {
    limits: SessionLimits,
    connections: ConnectionRegistry,
    masters: RoomMasterRegistry,
    breakouts: BreakoutRoomRegistry,
    workspaces: FileWorkspaceStore,
}

impl Coordinator {
    pub fn new(limits: SessionLimits) -> Self {
        Self { limits, ..Self::default() }
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    pub fn masters(&self) -> &RoomMasterRegistry {
        &self.masters
    }

    pub fn breakouts(&self) -> &BreakoutRoomRegistry {
        &self.breakouts
    }

    /// Current stored snapshot of a workspace (creates it empty if unseen).
    pub fn snapshot(&mut self, workspace_id: &str) -> WorkspaceSnapshot {
        self.workspaces.snapshot(workspace_id)
    }

    /// `None` for a room nobody ever joined.
    pub fn room_summary(&self, room_id: &str) -> Option<RoomSummary> {
        let master = self.masters.master_of(room_id).map(str::to_string);
        let users = self.connections.list_by_room(room_id);
        if master.is_none() && users.is_empty() {
            return None;
        }
        Some(RoomSummary {
            room_id: room_id.to_string(),
            master,
            breakout_rooms: self.breakouts.views(room_id, &self.connections),
            users,
        })
    }

    /// Handle one inbound frame from `conn`.
    ///
    /// A reply to the request itself (`ACK`, or `ERROR` when no ack id was
    /// given) is always the first delivery. A duplicate username is answered
    /// with `USERNAME_EXISTS`.
    pub fn handle(&mut self, conn: &str, frame: Inbound) -> Vec<Delivery> {
        let Inbound { event, ack } = frame;
        let name = event.name();
        let mut out = Outbox::default();

        let result = self.dispatch(conn, event, ack.is_some(), &mut out);
        let reply = match (result, ack) {
            (Ok(reply), Some(id)) => Some(ServerEvent::Ack(Ack {
                ack: id,
                result: reply.unwrap_or_else(AckResult::ok),
            })),
            (Ok(_), None) => None,
            (Err(err), ack) => {
                debug!(conn, event = name, %err, "request rejected");
                let duplicate = err == SessionErr::DuplicateUsername;
                if duplicate {
                    out.send(conn, ServerEvent::UsernameExists);
                }
                match ack {
                    Some(id) => Some(ServerEvent::Ack(Ack {
                        ack: id,
                        result: AckResult::Error { error: err.to_string() },
                    })),
                    // USERNAME_EXISTS already is the answer
                    None if duplicate => None,
                    None => Some(ServerEvent::Error(ErrorBody { error: err.to_string() })),
                }
            }
        };
        if let Some(reply) = reply {
            out.0.insert(0, Delivery { to: conn.to_string(), event: reply });
        }
        out.0
    }

    fn dispatch(
        &mut self,
        conn: &str,
        event: ClientEvent,
        wants_ack: bool,
        out: &mut Outbox,
    ) -> SessionResult<Option<AckResult>> {
        match event {
            ClientEvent::JoinRequest(req)           => self.join(conn, req, out).map(|_| None),
            ClientEvent::CreateBreakoutRoom(req)    => self.create_breakout(conn, req, out).map(Some),
            ClientEvent::GetBreakoutRooms(req)      => self.get_breakouts(conn, req, wants_ack, out),
            ClientEvent::JoinBreakoutRoom(req)      => self.join_breakout(conn, req, out).map(|_| None),
            ClientEvent::LeaveBreakoutRoom(req)     => self.leave_breakout(conn, req, out).map(|_| None),
            ClientEvent::SwitchBreakoutRoom(req)    => self.switch_breakout(conn, req, out).map(|_| None),
            ClientEvent::AssignToBreakoutRoom(req)  => self.assign_breakout(conn, req, out).map(|_| None),
            ClientEvent::CloseBreakoutRoom(req)     => self.close_breakout(conn, req, out).map(|_| None),
            ClientEvent::SyncFiles(snapshot)        => self.sync_files(conn, snapshot, out).map(|_| None),
            ClientEvent::FileCreated(p)             => self.file_created(conn, p, out).map(|_| None),
            ClientEvent::FileUpdated(p)             => self.file_updated(conn, p, out).map(Some),
            ClientEvent::FileRenamed(p)             => self.file_renamed(conn, p, out).map(|_| None),
            ClientEvent::FileDeleted(r)             => self.file_deleted(conn, r, out).map(|_| None),
            ClientEvent::UserOnline                 => self.set_status(conn, UserStatus::Online, out).map(|_| None),
            ClientEvent::UserOffline                => self.set_status(conn, UserStatus::Offline, out).map(|_| None),
            ClientEvent::TypingStart(t)             => self.typing(conn, Some(t.cursor_position), out).map(|_| None),
            ClientEvent::TypingPause                => self.typing(conn, None, out).map(|_| None),
            ClientEvent::SendMessage(msg)           => self.relay_chat(conn, msg, out).map(|_| None),
        }
    }

    /// Connection went away: drop its user, keep the master record as is.
    pub fn disconnect(&mut self, conn: &str) -> Vec<Delivery> {
        let mut out = Outbox::default();
        let Some(user) = self.connections.unregister(conn) else {
            return out.0;
        };
        info!(conn, username = %user.username, room = %user.room_id, "user disconnected");

        if let Some(breakout_id) = self.breakouts.drop_member(conn) {
            if let Some(room) = self.breakouts.get(&breakout_id) {
                let roster = self.roster(room, &user);
                out.fan_out(self.members_of(room), ServerEvent::BreakoutRoomLeft(roster));
            }
            self.announce_breakout_list(&user.room_id, &mut out);
        }
        let room_id = user.room_id.clone();
        out.fan_out(self.connections.in_room(&room_id), ServerEvent::UserDisconnected(UserPayload { user }));
        out.0
    }

    /* ───────────── room membership ───────────── */

    fn join(&mut self, conn: &str, req: JoinRequest, out: &mut Outbox) -> SessionResult<()> {
        if let Some(existing) = self.connections.lookup(conn) {
            return Err(invalid(format!("Already joined room {}", existing.room_id)));
        }
        let room_id = req.room_id.trim();
        let username = req.username.trim();
        if room_id.chars().count() < self.limits.min_room_id_len {
            return Err(invalid(format!("Room id must be at least {} characters", self.limits.min_room_id_len)));
        }
        if username.chars().count() < self.limits.min_username_len {
            return Err(invalid(format!("Username must be at least {} characters", self.limits.min_username_len)));
        }

        let user = self.connections.register(conn, username, room_id, &mut self.masters)?;
        info!(conn, username, room = room_id, master = user.is_master, "user joined");

        out.fan_out(
            self.connections.in_room(room_id).filter(|u| u.connection_id != conn),
            ServerEvent::UserJoined(UserPayload { user: user.clone() }),
        );
        let users = self.connections.list_by_room(room_id);
        out.send(conn, ServerEvent::JoinAccepted(JoinAccepted { user, users }));
        out.send(conn, ServerEvent::SyncFiles(self.workspaces.snapshot(room_id)));
        Ok(())
    }

    /* ───────────── breakout rooms ───────────── */

    fn create_breakout(&mut self, conn: &str, req: CreateBreakoutRoom, out: &mut Outbox) -> SessionResult<AckResult> {
        let room = self
            .breakouts
            .create(&req.parent_room_id, &req.name, conn, &self.connections, &self.masters)?;
        info!(conn, id = %room.id, name = %room.name, parent = %room.parent_room_id, "breakout room created");
        self.announce_breakout_list(&room.parent_room_id, out);
        Ok(AckResult::Created { id: room.id, name: room.name })
    }

    fn get_breakouts(
        &mut self,
        conn: &str,
        req: ParentRoomRef,
        wants_ack: bool,
        out: &mut Outbox,
    ) -> SessionResult<Option<AckResult>> {
        let rooms = self.breakouts.views(&req.parent_room_id, &self.connections);
        if wants_ack {
            return Ok(Some(AckResult::Rooms { rooms }));
        }
        out.send(conn, ServerEvent::BreakoutRoomsList(BreakoutRoomsList { rooms }));
        Ok(None)
    }

    fn join_breakout(&mut self, conn: &str, req: BreakoutRoomRef, out: &mut Outbox) -> SessionResult<()> {
        self.breakouts.join(&req.breakout_room_id, conn, &mut self.connections)?;
        self.announce_arrival(conn, &req.breakout_room_id, out)
    }

    fn leave_breakout(&mut self, conn: &str, req: BreakoutRoomRef, out: &mut Outbox) -> SessionResult<()> {
        self.breakouts.leave(&req.breakout_room_id, conn, &mut self.connections)?;
        let user = self.connections.joined(conn)?.clone();
        self.announce_departure(&user, &req.breakout_room_id, out);
        out.send(conn, ServerEvent::SyncFiles(self.workspaces.snapshot(&user.room_id)));
        self.announce_breakout_list(&user.room_id, out);
        Ok(())
    }

    fn switch_breakout(&mut self, conn: &str, req: SwitchBreakoutRoom, out: &mut Outbox) -> SessionResult<()> {
        self.breakouts.switch(&req.from, &req.to, conn, &mut self.connections)?;
        if req.from != req.to {
            let user = self.connections.joined(conn)?.clone();
            self.announce_departure(&user, &req.from, out);
        }
        self.announce_arrival(conn, &req.to, out)
    }

    fn assign_breakout(&mut self, conn: &str, req: AssignToBreakoutRoom, out: &mut Outbox) -> SessionResult<()> {
        let target = req.connection_id.as_str();
        let previous = self.breakouts.assign(
            &req.breakout_room_id,
            target,
            conn,
            &mut self.connections,
            &self.masters,
        )?;
        if let Some(prev) = previous.as_deref().filter(|p| *p != req.breakout_room_id) {
            let user = self.connections.joined(target)?.clone();
            self.announce_departure(&user, prev, out);
        }
        if let Some(room) = self.breakouts.get(&req.breakout_room_id) {
            out.send(target, ServerEvent::AssignedToBreakoutRoom(AssignedToBreakoutRoom {
                breakout_room_id: room.id.clone(),
                name: room.name.clone(),
            }));
        }
        self.announce_arrival(target, &req.breakout_room_id, out)
    }

    fn close_breakout(&mut self, conn: &str, req: BreakoutRoomRef, out: &mut Outbox) -> SessionResult<()> {
        let room = self
            .breakouts
            .close(&req.breakout_room_id, conn, &mut self.connections, &self.masters)?;
        self.workspaces.discard(&room.id);
        info!(conn, id = %room.id, evicted = room.members().len(), "breakout room closed");

        let closed = ServerEvent::BreakoutRoomClosed(BreakoutRoomClosed { breakout_room_id: room.id.clone() });
        let parent_snapshot = self.workspaces.snapshot(&room.parent_room_id);
        for member in room.members() {
            out.send(member, closed.clone());
            out.send(member, ServerEvent::SyncFiles(parent_snapshot.clone()));
        }
        out.fan_out(
            self.connections
                .in_room(&room.parent_room_id)
                .filter(|u| !room.members().contains(&u.connection_id)),
            closed,
        );
        self.announce_breakout_list(&room.parent_room_id, out);
        Ok(())
    }

    /// `BREAKOUT_ROOM_JOINED` to the channel, snapshot to the newcomer, fresh
    /// list to the parent room.
    fn announce_arrival(&mut self, conn: &str, breakout_id: &str, out: &mut Outbox) -> SessionResult<()> {
        let user = self.connections.joined(conn)?.clone();
        let room = self
            .breakouts
            .get(breakout_id)
            .ok_or(SessionErr::NotFound("Breakout room"))?;
        let roster = self.roster(room, &user);
        out.fan_out(self.members_of(room), ServerEvent::BreakoutRoomJoined(roster));
        out.send(conn, ServerEvent::SyncFiles(self.workspaces.snapshot(breakout_id)));
        self.announce_breakout_list(&user.room_id, out);
        Ok(())
    }

    /// `BREAKOUT_ROOM_LEFT` to whoever remains in the channel and to the leaver.
    fn announce_departure(&self, user: &User, breakout_id: &str, out: &mut Outbox) {
        if let Some(room) = self.breakouts.get(breakout_id) {
            let left = ServerEvent::BreakoutRoomLeft(self.roster(room, user));
            out.fan_out(self.members_of(room), left.clone());
            out.send(&user.connection_id, left);
        }
    }

    fn announce_breakout_list(&self, parent_room_id: &str, out: &mut Outbox) {
        let rooms = self.breakouts.views(parent_room_id, &self.connections);
        out.fan_out(
            self.connections.in_room(parent_room_id),
            ServerEvent::BreakoutRoomsList(BreakoutRoomsList { rooms }),
        );
    }

    fn roster(&self, room: &BreakoutRoom, user: &User) -> RoomRoster {
        RoomRoster { user: user.clone(), users: self.connections.resolve(room.members()) }
    }

    fn members_of<'a>(&'a self, room: &'a BreakoutRoom) -> impl Iterator<Item = &'a User> + 'a {
        room.members().iter().filter_map(|c| self.connections.lookup(c))
    }

    /* ───────────── workspace replication ───────────── */

    /// The sender's active workspace id.
    fn workspace_of(&self, conn: &str) -> SessionResult<String> {
        Ok(self.connections.joined(conn)?.active_workspace().to_string())
    }

    /// Everyone editing `workspace_id` except the originator.
    fn peers_in<'a>(&'a self, workspace_id: &'a str, conn: &'a str) -> impl Iterator<Item = &'a User> + 'a {
        self.connections
            .in_workspace(workspace_id)
            .filter(move |u| u.connection_id != conn)
    }

    fn sync_files(&mut self, conn: &str, snapshot: WorkspaceSnapshot, out: &mut Outbox) -> SessionResult<()> {
        let ws = self.workspace_of(conn)?;
        let stored = self.workspaces.replace(&ws, snapshot)?;
        out.fan_out(self.peers_in(&ws, conn), ServerEvent::SyncFiles(stored));
        Ok(())
    }

    fn file_created(&mut self, conn: &str, p: FilePayload, out: &mut Outbox) -> SessionResult<()> {
        let ws = self.workspace_of(conn)?;
        let file = self.workspaces.create_file(&ws, p.file)?;
        out.fan_out(self.peers_in(&ws, conn), ServerEvent::FileCreated(FilePayload { file }));
        Ok(())
    }

    fn file_updated(&mut self, conn: &str, p: FilePayload, out: &mut Outbox) -> SessionResult<AckResult> {
        let ws = self.workspace_of(conn)?;
        let file = self.workspaces.update_file(&ws, &p.file.id, p.file.content)?;
        let revision = file.revision;
        out.fan_out(self.peers_in(&ws, conn), ServerEvent::FileUpdated(FilePayload { file }));
        Ok(AckResult::Revision { success: true, revision })
    }

    fn file_renamed(&mut self, conn: &str, p: FilePayload, out: &mut Outbox) -> SessionResult<()> {
        let ws = self.workspace_of(conn)?;
        let file = self.workspaces.rename_file(&ws, &p.file.id, &p.file.name)?;
        out.fan_out(self.peers_in(&ws, conn), ServerEvent::FileRenamed(FilePayload { file }));
        Ok(())
    }

    fn file_deleted(&mut self, conn: &str, r: FileRef, out: &mut Outbox) -> SessionResult<()> {
        let ws = self.workspace_of(conn)?;
        self.workspaces.delete_file(&ws, &r.id)?;
        out.fan_out(self.peers_in(&ws, conn), ServerEvent::FileDeleted(r));
        Ok(())
    }

    /* ───────────── presence & chat (parent room scope) ───────────── */

    fn room_peers<'a>(&'a self, room_id: &'a str, conn: &'a str) -> impl Iterator<Item = &'a User> + 'a {
        self.connections
            .in_room(room_id)
            .filter(move |u| u.connection_id != conn)
    }

    fn set_status(&mut self, conn: &str, status: UserStatus, out: &mut Outbox) -> SessionResult<()> {
        let user = self.connections.lookup_mut(conn).ok_or(SessionErr::NotJoined)?;
        user.status = status;
        let room_id = user.room_id.clone();
        let body = ConnectionRef { connection_id: conn.to_string() };
        let event = match status {
            UserStatus::Online => ServerEvent::UserOnline(body),
            UserStatus::Offline => ServerEvent::UserOffline(body),
        };
        out.fan_out(self.room_peers(&room_id, conn), event);
        Ok(())
    }

    /// `Some(cursor)` starts typing at `cursor`, `None` pauses.
    fn typing(&mut self, conn: &str, cursor: Option<u64>, out: &mut Outbox) -> SessionResult<()> {
        let user = self.connections.lookup_mut(conn).ok_or(SessionErr::NotJoined)?;
        user.typing = cursor.is_some();
        if let Some(pos) = cursor {
            user.cursor_position = pos;
        }
        let user = user.clone();
        let room_id = user.room_id.clone();
        let event = if cursor.is_some() {
            ServerEvent::TypingStart(UserPayload { user })
        } else {
            ServerEvent::TypingPause(UserPayload { user })
        };
        out.fan_out(self.room_peers(&room_id, conn), event);
        Ok(())
    }

    fn relay_chat(&mut self, conn: &str, msg: ChatMessage, out: &mut Outbox) -> SessionResult<()> {
        let room_id = self.connections.joined(conn)?.room_id.clone();
        out.fan_out(self.room_peers(&room_id, conn), ServerEvent::ReceiveMessage(msg));
        Ok(())
    }
}
