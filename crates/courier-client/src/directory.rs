//! The user directory shown in the left pane.

use courier_shared::{User, UserId};

#[derive(Debug, Clone, Default)]
pub struct Directory {
    users: Vec<User>,
    last_error: Option<String>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing with a fresh fetch, leaving out the local user.
    pub fn replace(&mut self, users: Vec<User>, own_id: Option<&UserId>) -> usize {
        self.users = users
            .into_iter()
            .filter(|u| Some(&u.id) != own_id)
            .collect();
        self.last_error = None;
        self.users.len()
    }

    /// Record a failed fetch. The previous listing is kept.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    /// Zero-based lookup, as listed.
    pub fn get(&self, index: usize) -> Option<&User> {
        self.users.get(index)
    }

    pub fn find(&self, id: &UserId) -> Option<&User> {
        self.users.iter().find(|u| &u.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
