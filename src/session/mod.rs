//! Client-side credential storage.
//!
//! The client only needs synchronous key-value access; the lifecycle of the
//! backing storage belongs to whoever constructs the store.

mod file_store;

pub use file_store::FileStore;

use std::collections::HashMap;
use std::sync::Mutex;

pub const ACCESS_TOKEN: &str = "access_token";
pub const REFRESH_TOKEN: &str = "refresh_token";
pub const ROLE: &str = "role";
pub const USER_ID: &str = "user_id";
pub const USERNAME: &str = "username";
pub const EMAIL: &str = "email";
pub const LOGGED_IN_AT: &str = "logged_in_at";

/// Every key removed by a logout.
pub const SESSION_KEYS: &[&str] = &[
    ACCESS_TOKEN,
    REFRESH_TOKEN,
    ROLE,
    USER_ID,
    USERNAME,
    EMAIL,
    LOGGED_IN_AT,
];

pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);

    /// Remove every session key.
    fn clear_session(&self) {
        for key in SESSION_KEYS {
            self.remove(key);
        }
    }

    fn access_token(&self) -> Option<String> {
        self.get(ACCESS_TOKEN).filter(|t| !t.trim().is_empty())
    }

    fn refresh_token(&self) -> Option<String> {
        self.get(REFRESH_TOKEN).filter(|t| !t.trim().is_empty())
    }

    fn store_tokens(&self, access_token: &str, refresh_token: &str) {
        self.set(ACCESS_TOKEN, access_token);
        self.set(REFRESH_TOKEN, refresh_token);
    }
}

/// In-process store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}
