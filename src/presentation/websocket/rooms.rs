//! Room Registry
//!
//! Chat id to subscribed user ids. Only ever touched from the hub loop, so
//! it carries no synchronization of its own. Rooms store identities, not
//! handles; the hub resolves them through its live-connection table.

use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<i64, HashSet<i64>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a room, creating it on first join.
    /// Returns `false` if the user was already a member.
    pub fn join(&mut self, chat_id: i64, user_id: i64) -> bool {
        self.rooms.entry(chat_id).or_default().insert(user_id)
    }

    /// Remove a user from a room, deleting the room once empty.
    /// Returns `false` if the user was not a member.
    pub fn leave(&mut self, chat_id: i64, user_id: i64) -> bool {
        let Some(members) = self.rooms.get_mut(&chat_id) else {
            return false;
        };
        let removed = members.remove(&user_id);
        if members.is_empty() {
            self.rooms.remove(&chat_id);
        }
        removed
    }

    /// Remove a user from every listed room.
    pub fn remove_member<'a>(&mut self, user_id: i64, chat_ids: impl IntoIterator<Item = &'a i64>) {
        for chat_id in chat_ids {
            self.leave(*chat_id, user_id);
        }
    }

    pub fn members(&self, chat_id: i64) -> Option<&HashSet<i64>> {
        self.rooms.get(&chat_id)
    }

    pub fn contains(&self, chat_id: i64) -> bool {
        self.rooms.contains_key(&chat_id)
    }

    pub fn is_member(&self, chat_id: i64, user_id: i64) -> bool {
        self.rooms
            .get(&chat_id)
            .map(|members| members.contains(&user_id))
            .unwrap_or(false)
    }

    /// Number of non-empty rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&i64, &HashSet<i64>)> {
        self.rooms.iter()
    }
}
