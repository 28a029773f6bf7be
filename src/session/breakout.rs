//! Breakout rooms: sub-rooms scoped to a parent room.
//!
//! A room is created by the parent room's master, gains and loses members,
//! and is gone for good once closed. Nothing here collects empty rooms.

use crate::{
    error::{invalid, SessionErr, SessionResult},
    models::{BreakoutRoomId, BreakoutRoomView, ConnectionId, RoomId},
    session::{connections::ConnectionRegistry, masters::RoomMasterRegistry},
    utils::ids,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakoutRoom {
    pub id: BreakoutRoomId,
    pub name: String,
    pub parent_room_id: RoomId,
    members: Vec<ConnectionId>,
}

impl BreakoutRoom {
    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    pub fn view(&self, users: &ConnectionRegistry) -> BreakoutRoomView {
        BreakoutRoomView {
            id:             self.id.clone(),
            name:           self.name.clone(),
            parent_room_id: self.parent_room_id.clone(),
            users:          users.resolve(&self.members),
        }
    }

    fn admit(&mut self, conn: &str) {
        self.members.retain(|c| c != conn);
        self.members.push(conn.to_string());
    }

    fn evict(&mut self, conn: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|c| c != conn);
        before != self.members.len()
    }
}

/// All open breakout rooms, in creation order.
#[derive(Debug, Default)]
pub struct BreakoutRoomRegistry {
    rooms: Vec<BreakoutRoom>,
}

impl BreakoutRoomRegistry {
    pub fn get(&self, id: &str) -> Option<&BreakoutRoom> {
        self.rooms.iter().find(|r| r.id == id)
    }

    fn get_mut(&mut self, id: &str) -> SessionResult<&mut BreakoutRoom> {
        self.rooms
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(SessionErr::NotFound("Breakout room"))
    }

    fn require(&self, id: &str) -> SessionResult<&BreakoutRoom> {
        self.get(id).ok_or(SessionErr::NotFound("Breakout room"))
    }

    pub fn list<'a>(&'a self, parent_room_id: &'a str) -> impl Iterator<Item = &'a BreakoutRoom> + 'a {
        self.rooms.iter().filter(move |r| r.parent_room_id == parent_room_id)
    }

    pub fn views(&self, parent_room_id: &str, users: &ConnectionRegistry) -> Vec<BreakoutRoomView> {
        self.list(parent_room_id).map(|r| r.view(users)).collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Open a new, empty breakout room under `parent_room_id`.
    pub fn create(
        &mut self,
        parent_room_id: &str,
        name: &str,
        requester: &str,
        users: &ConnectionRegistry,
        masters: &RoomMasterRegistry,
    ) -> SessionResult<BreakoutRoom> {
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("Breakout room name is required"));
        }
        authorize_master(parent_room_id, requester, users, masters)?;

        let mut id = ids::breakout_room_id();
        while self.get(&id).is_some() {
            id = ids::breakout_room_id();
        }
        let room = BreakoutRoom {
            id,
            name: name.to_string(),
            parent_room_id: parent_room_id.to_string(),
            members: Vec::new(),
        };
        self.rooms.push(room.clone());
        Ok(room)
    }

    /// Put `conn` into `id`. A user sitting in a different breakout room must
    /// leave it first (or use [`switch`](Self::switch)).
    pub fn join(&mut self, id: &str, conn: &str, users: &mut ConnectionRegistry) -> SessionResult<()> {
        let user = users.joined(conn)?;
        let room = self.require(id)?;
        if room.parent_room_id != user.room_id {
            return Err(SessionErr::Forbidden);
        }
        if let Some(current) = user.breakout_room_id.as_deref().filter(|c| *c != id) {
            return Err(invalid(format!("Already in breakout room {current}; leave it first")));
        }

        self.get_mut(id)?.admit(conn);
        set_breakout(users, conn, Some(id));
        Ok(())
    }

    /// Take `conn` out of `id`, returning it to its parent room's workspace.
    pub fn leave(&mut self, id: &str, conn: &str, users: &mut ConnectionRegistry) -> SessionResult<()> {
        let user = users.joined(conn)?;
        let in_room = user.breakout_room_id.as_deref() == Some(id);
        let room = self.get_mut(id)?;
        if !room.evict(conn) && !in_room {
            return Err(invalid("Not a member of this breakout room"));
        }
        set_breakout(users, conn, None);
        Ok(())
    }

    /// Leave `from` and join `to` in one step. Every check runs before any
    /// state changes, so a failed switch leaves the user where it was.
    pub fn switch(&mut self, from: &str, to: &str, conn: &str, users: &mut ConnectionRegistry) -> SessionResult<()> {
        let user = users.joined(conn)?;
        self.require(from)?;
        let target = self.require(to)?;
        if user.breakout_room_id.as_deref() != Some(from) {
            return Err(invalid("Not a member of this breakout room"));
        }
        if target.parent_room_id != user.room_id {
            return Err(SessionErr::Forbidden);
        }
        if from == to {
            return Ok(());
        }

        self.get_mut(from)?.evict(conn);
        self.get_mut(to)?.admit(conn);
        set_breakout(users, conn, Some(to));
        Ok(())
    }

    /// Master moves `target` into `id`, pulling it out of any other breakout
    /// room first. Returns the room the target came from.
    pub fn assign(
        &mut self,
        id: &str,
        target: &str,
        requester: &str,
        users: &mut ConnectionRegistry,
        masters: &RoomMasterRegistry,
    ) -> SessionResult<Option<BreakoutRoomId>> {
        let parent = self.require(id)?.parent_room_id.clone();
        authorize_master(&parent, requester, users, masters)?;
        let previous = match users.lookup(target) {
            Some(u) if u.room_id == parent => u.breakout_room_id.clone(),
            _ => return Err(SessionErr::NotFound("User")),
        };

        if let Some(prev) = previous.as_deref().filter(|p| *p != id) {
            if let Ok(room) = self.get_mut(prev) {
                room.evict(target);
            }
        }
        self.get_mut(id)?.admit(target);
        set_breakout(users, target, Some(id));
        Ok(previous)
    }

    /// Remove `id` and send every member back to the parent room. The returned
    /// room still lists the evicted members.
    pub fn close(
        &mut self,
        id: &str,
        requester: &str,
        users: &mut ConnectionRegistry,
        masters: &RoomMasterRegistry,
    ) -> SessionResult<BreakoutRoom> {
        let parent = self.require(id)?.parent_room_id.clone();
        authorize_master(&parent, requester, users, masters)?;

        let idx = self
            .rooms
            .iter()
            .position(|r| r.id == id)
            .ok_or(SessionErr::NotFound("Breakout room"))?;
        let room = self.rooms.remove(idx);
        for conn in &room.members {
            if let Some(user) = users.lookup_mut(conn) {
                if user.breakout_room_id.as_deref() == Some(id) {
                    user.breakout_room_id = None;
                }
            }
        }
        Ok(room)
    }

    /// Forget `conn` everywhere; used when its connection goes away.
    pub fn drop_member(&mut self, conn: &str) -> Option<BreakoutRoomId> {
        self.rooms
            .iter_mut()
            .find_map(|r| r.evict(conn).then(|| r.id.clone()))
    }
}

fn authorize_master(
    parent_room_id: &str,
    requester: &str,
    users: &ConnectionRegistry,
    masters: &RoomMasterRegistry,
) -> SessionResult<()> {
    let user = users.joined(requester)?;
    if user.room_id != parent_room_id || !masters.is_master(parent_room_id, &user.username) {
        return Err(SessionErr::Forbidden);
    }
    Ok(())
}

fn set_breakout(users: &mut ConnectionRegistry, conn: &str, id: Option<&str>) {
    if let Some(user) = users.lookup_mut(conn) {
        user.breakout_room_id = id.map(str::to_string);
    }
}
