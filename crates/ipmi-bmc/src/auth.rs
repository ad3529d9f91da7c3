//! Credential lookup for the RAKP handshake.

use std::collections::HashMap;

/// Maps usernames to passwords.
///
/// The handshake treats a `None` exactly like a bad authcode: no reply,
/// so remote consoles cannot probe which usernames exist.
pub trait AuthStore {
    fn password_for(&self, username: &[u8]) -> Option<Vec<u8>>;
}

/// In-memory credential table.
#[derive(Debug, Default, Clone)]
pub struct StaticAuth {
    users: HashMap<Vec<u8>, Vec<u8>>,
}

impl StaticAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, username: &str, password: &str) {
        self.users
            .insert(username.as_bytes().to_vec(), password.as_bytes().to_vec());
    }

    pub fn with_user(mut self, username: &str, password: &str) -> Self {
        self.add_user(username, password);
        self
    }
}

impl AuthStore for StaticAuth {
    fn password_for(&self, username: &[u8]) -> Option<Vec<u8>> {
        self.users.get(username).cloned()
    }
}
