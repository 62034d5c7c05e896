//! Identifier types shared by every layer.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A user's identity as issued by the external user store.
///
/// `#[serde(transparent)]` keeps the wire form a plain number, which is
/// what clients already send and expect (`"userLeft": 42`).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A room's identifier, sourced from the external store.
///
/// The relay treats it as an opaque key: public rooms and invitation
/// rooms look the same here.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Identifier the store assigns to a persisted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// The canonical id of the private channel between two users.
///
/// Always `"{low}:{high}"` with the two user ids in ascending numeric
/// order, so both participants compute the same value no matter who
/// speaks first.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Resolves the channel shared by `a` and `b`.
    ///
    /// ```rust
    /// use huddle_protocol::{ChannelId, UserId};
    ///
    /// let id = ChannelId::between(UserId(10), UserId(7));
    /// assert_eq!(id.as_str(), "7:10");
    /// assert_eq!(id, ChannelId::between(UserId(7), UserId(10)));
    /// ```
    pub fn between(a: UserId, b: UserId) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}:{}", low.0, high.0))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who a connection belongs to, as resolved from its session token.
///
/// Serializes as `{"id": 1, "username": "alice"}`, the shape of the
/// `connected` and `userJoined` payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    pub username: String,
}
