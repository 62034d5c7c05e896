//! In-memory store used by the dev binary and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use huddle_protocol::{MessageId, UserId, UserIdentity};
use rand::Rng;
use tokio::sync::RwLock;

use crate::{MessageStore, NewMessage, SessionStore, StoreError, StoredMessage};

/// A [`SessionStore`] and [`MessageStore`] backed by hash maps.
///
/// User ids and message ids are handed out sequentially starting at 1.
/// [`set_available`](Self::set_available) simulates an outage: while
/// unavailable, every trait call fails with [`StoreError::Unavailable`].
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, UserIdentity>>,
    last_active: RwLock<HashMap<UserId, DateTime<Utc>>>,
    messages: RwLock<Vec<(StoredMessage, NewMessage)>>,
    next_user_id: AtomicU64,
    next_message_id: AtomicU64,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            last_active: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            next_user_id: AtomicU64::new(1),
            next_message_id: AtomicU64::new(1),
            available: AtomicBool::new(true),
        }
    }

    /// Adds a user with a freshly generated session token.
    pub async fn add_user(&self, username: &str) -> (UserIdentity, String) {
        let token = generate_token();
        let identity = self.add_user_with_token(username, &token).await;
        (identity, token)
    }

    /// Adds a user whose session token is `token`.
    ///
    /// Used to seed users from configuration. A token that is already
    /// taken is rebound to the new user.
    pub async fn add_user_with_token(&self, username: &str, token: &str) -> UserIdentity {
        let id = UserId(self.next_user_id.fetch_add(1, Ordering::Relaxed));
        let identity = UserIdentity {
            id,
            username: username.to_owned(),
        };
        self.sessions
            .write()
            .await
            .insert(token.to_owned(), identity.clone());
        tracing::debug!(user_id = %id, username, "user added to memory store");
        identity
    }

    /// Toggles the simulated outage.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    /// Every message persisted so far, oldest first.
    pub async fn messages(&self) -> Vec<(StoredMessage, NewMessage)> {
        self.messages.read().await.clone()
    }

    /// When `user_id` was last touched, if ever.
    pub async fn last_active(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        self.last_active.read().await.get(&user_id).copied()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".into()))
        }
    }
}

impl SessionStore for MemoryStore {
    async fn resolve_session(&self, token: &str) -> Result<Option<UserIdentity>, StoreError> {
        self.check_available()?;
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn touch_activity(&self, user_id: UserId) -> Result<(), StoreError> {
        self.check_available()?;
        self.last_active.write().await.insert(user_id, Utc::now());
        Ok(())
    }
}

impl MessageStore for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> Result<StoredMessage, StoreError> {
        self.check_available()?;
        if message.content.is_empty() {
            return Err(StoreError::Rejected("empty message".into()));
        }
        let stored = StoredMessage {
            id: MessageId(self.next_message_id.fetch_add(1, Ordering::Relaxed)),
            created_at: Utc::now(),
        };
        self.messages.write().await.push((stored, message));
        Ok(stored)
    }
}

/// 128 random bits as lowercase hex.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
