use std::collections::HashMap;

use crate::models::RoomId;

/// Sticky master per room: the first joiner wins and keeps the role for the
/// lifetime of the process. Nothing here demotes or transfers a master.
#[derive(Debug, Default)]
pub struct RoomMasterRegistry {
    masters: HashMap<RoomId, String>,
}

impl RoomMasterRegistry {
    /// Record `username` as master when the room has none; otherwise report
    /// whether `username` is the recorded master.
    pub fn assign_or_confirm(&mut self, room_id: &str, username: &str) -> bool {
        let master = self
            .masters
            .entry(room_id.to_string())
            .or_insert_with(|| username.to_string());
        master == username
    }

    pub fn master_of(&self, room_id: &str) -> Option<&str> {
        self.masters.get(room_id).map(String::as_str)
    }

    pub fn is_master(&self, room_id: &str, username: &str) -> bool {
        self.master_of(room_id) == Some(username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_joiner_wins() {
        let mut reg = RoomMasterRegistry::default();
        assert!(reg.assign_or_confirm("r1", "alice"));
        assert!(!reg.assign_or_confirm("r1", "bob"));
        assert_eq!(reg.master_of("r1"), Some("alice"));
    }

    #[test]
    fn test_reconfirm_same_username() {
        let mut reg = RoomMasterRegistry::default();
        reg.assign_or_confirm("r1", "alice");
        assert!(reg.assign_or_confirm("r1", "alice"));
        assert!(reg.is_master("r1", "alice"));
        assert!(!reg.is_master("r1", "bob"));
    }

    #[test]
    fn test_rooms_are_independent() {
        let mut reg = RoomMasterRegistry::default();
        reg.assign_or_confirm("r1", "alice");
        assert!(reg.assign_or_confirm("r2", "bob"));
        assert_eq!(reg.master_of("r3"), None);
    }
}
