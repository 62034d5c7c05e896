//! Collaborator traits the relay consumes.

use std::future::Future;

use chrono::{DateTime, Utc};
use huddle_protocol::{MessageId, RoomId, UserId, UserIdentity};

use crate::StoreError;

/// Looks up who a session token belongs to.
///
/// `Send + Sync + 'static` because a single store is shared by every
/// connection task, and the activity touch is spawned onto its own task.
pub trait SessionStore: Send + Sync + 'static {
    /// Returns the identity bound to `token`, or `None` if no active
    /// session matches.
    ///
    /// # Errors
    /// [`StoreError::Unavailable`] if the store can't be reached.
    fn resolve_session(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<UserIdentity>, StoreError>> + Send;

    /// Records that `user_id` was just active.
    fn touch_activity(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Where a message is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Room(RoomId),
    /// A one-to-one message to the given recipient.
    Private(UserId),
}

/// A message about to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub author: UserId,
    pub target: MessageTarget,
}

/// What the store hands back after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
}

/// Persists chat messages.
pub trait MessageStore: Send + Sync + 'static {
    /// Writes `message` and returns its assigned id and timestamp.
    ///
    /// # Errors
    /// [`StoreError::Unavailable`] or [`StoreError::Rejected`]. The relay
    /// logs either and drops the message from real-time delivery.
    fn create_message(
        &self,
        message: NewMessage,
    ) -> impl Future<Output = Result<StoredMessage, StoreError>> + Send;
}
