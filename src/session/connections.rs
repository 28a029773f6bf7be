use crate::{
    error::{SessionErr, SessionResult},
    models::{ConnectionId, User, UserStatus},
    session::masters::RoomMasterRegistry,
};

/// Live connections and the user bound to each, in join order.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    users: Vec<User>,
}

impl ConnectionRegistry {
    /// Bind `conn` to a new user of `room_id`.
    ///
    /// The duplicate check runs before the master registry is consulted, so a
    /// rejected join leaves every registry untouched.
    pub fn register(
        &mut self,
        conn: &str,
        username: &str,
        room_id: &str,
        masters: &mut RoomMasterRegistry,
    ) -> SessionResult<User> {
        if self.in_room(room_id).any(|u| u.username == username) {
            return Err(SessionErr::DuplicateUsername);
        }
        let is_master = masters.assign_or_confirm(room_id, username);
        let user = User {
            username:         username.to_string(),
            room_id:          room_id.to_string(),
            breakout_room_id: None,
            is_master,
            connection_id:    conn.to_string(),
            status:           UserStatus::Online,
            typing:           false,
            cursor_position:  0,
        };
        self.users.push(user.clone());
        Ok(user)
    }

    /// Drop the user bound to `conn`. Other users are not touched.
    pub fn unregister(&mut self, conn: &str) -> Option<User> {
        let idx = self.users.iter().position(|u| u.connection_id == conn)?;
        Some(self.users.remove(idx))
    }

    pub fn lookup(&self, conn: &str) -> Option<&User> {
        self.users.iter().find(|u| u.connection_id == conn)
    }

    pub fn lookup_mut(&mut self, conn: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.connection_id == conn)
    }

    /// Like [`lookup`](Self::lookup) but fails for connections that never joined.
    pub fn joined(&self, conn: &str) -> SessionResult<&User> {
        self.lookup(conn).ok_or(SessionErr::NotJoined)
    }

    pub fn in_room<'a>(&'a self, room_id: &'a str) -> impl Iterator<Item = &'a User> + 'a {
        self.users.iter().filter(move |u| u.room_id == room_id)
    }

    pub fn list_by_room(&self, room_id: &str) -> Vec<User> {
        self.in_room(room_id).cloned().collect()
    }

    /// Connections whose active workspace is `workspace_id`.
    pub fn in_workspace<'a>(&'a self, workspace_id: &'a str) -> impl Iterator<Item = &'a User> + 'a {
        self.users.iter().filter(move |u| u.active_workspace() == workspace_id)
    }

    pub fn resolve(&self, conns: &[ConnectionId]) -> Vec<User> {
        conns.iter().filter_map(|c| self.lookup(c).cloned()).collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_resolves_master() {
        let mut masters = RoomMasterRegistry::default();
        let mut reg = ConnectionRegistry::default();

        let alice = reg.register("c1", "alice", "room-1", &mut masters).unwrap();
        let bob = reg.register("c2", "bob", "room-1", &mut masters).unwrap();

        assert!(alice.is_master);
        assert!(!bob.is_master);
        assert_eq!(bob.status, UserStatus::Online);
        assert_eq!(bob.breakout_room_id, None);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_duplicate_username_rejected_without_side_effects() {
        let mut masters = RoomMasterRegistry::default();
        let mut reg = ConnectionRegistry::default();
        reg.register("c1", "alice", "room-1", &mut masters).unwrap();

        let err = reg.register("c2", "alice", "room-1", &mut masters).unwrap_err();
        assert_eq!(err, SessionErr::DuplicateUsername);
        assert_eq!(reg.len(), 1);
        assert!(reg.lookup("c2").is_none());

        // same name in another room is fine
        assert!(reg.register("c3", "alice", "room-2", &mut masters).is_ok());
    }

    #[test]
    fn test_unregister_keeps_others() {
        let mut masters = RoomMasterRegistry::default();
        let mut reg = ConnectionRegistry::default();
        reg.register("c1", "alice", "room-1", &mut masters).unwrap();
        reg.register("c2", "bob", "room-1", &mut masters).unwrap();

        let gone = reg.unregister("c1").unwrap();
        assert_eq!(gone.username, "alice");
        assert!(reg.unregister("c1").is_none());

        let left = reg.list_by_room("room-1");
        assert_eq!(left.len(), 1);
        assert!(!left[0].is_master);
    }

    #[test]
    fn test_in_workspace_follows_breakout() {
        let mut masters = RoomMasterRegistry::default();
        let mut reg = ConnectionRegistry::default();
        reg.register("c1", "alice", "room-1", &mut masters).unwrap();
        reg.register("c2", "bob", "room-1", &mut masters).unwrap();
        reg.lookup_mut("c2").unwrap().breakout_room_id = Some("bo".into());

        let main: Vec<_> = reg.in_workspace("room-1").map(|u| u.username.as_str()).collect();
        let sub: Vec<_> = reg.in_workspace("bo").map(|u| u.username.as_str()).collect();
        assert_eq!(main, vec!["alice"]);
        assert_eq!(sub, vec!["bob"]);
        assert_eq!(reg.in_room("room-1").count(), 2);
    }
}
