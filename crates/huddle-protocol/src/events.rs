//! Events exchanged over a client connection.
//!
//! After the [`Handshake`], every frame is an adjacently tagged object:
//!
//! ```text
//! { "event": "sendMessage", "data": { "content": "hi", "roomId": 5 } }
//! ```
//!
//! Event names and field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{MessageId, ProtocolError, RoomId, UserId, UserIdentity};

/// The protocol version clients must announce in their handshake.
pub const PROTOCOL_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// The first frame a client sends: `{"version": 1, "sessionId": "..."}`.
///
/// A missing `sessionId` is allowed by the decoder so the relay can answer
/// with a proper 401 instead of a decode error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub version: u32,
    #[serde(default)]
    pub session_id: Option<String>,
}

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Target of a `requestWebcam`: exactly one of the two must be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebcamTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<UserId>,
}

/// Where a call request goes once validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallContext {
    /// Ask everyone else in the room; the first to accept becomes the
    /// counterpart.
    Room(RoomId),
    /// Ask one user directly.
    User(UserId),
}

impl WebcamTarget {
    /// Validates the target.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] if both or neither field is set.
    pub fn context(&self) -> Result<CallContext, ProtocolError> {
        match (self.room_id, self.recipient_id) {
            (Some(room_id), None) => Ok(CallContext::Room(room_id)),
            (None, Some(user_id)) => Ok(CallContext::User(user_id)),
            (Some(_), Some(_)) => Err(ProtocolError::InvalidMessage(
                "requestWebcam must name a room or a recipient, not both".into(),
            )),
            (None, None) => Err(ProtocolError::InvalidMessage(
                "requestWebcam must name a room or a recipient".into(),
            )),
        }
    }
}

/// Everything a client may send after the handshake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Enter a public room, leaving any other public room.
    JoinRoom(RoomId),
    /// Leave a room.
    LeaveRoom(RoomId),
    /// Post to a room.
    SendMessage { content: String, room_id: RoomId },
    /// Post to the private channel shared with `recipient_id`.
    SendPrivateMessage { content: String, recipient_id: UserId },
    /// Ask for a video call.
    RequestWebcam(WebcamTarget),
    /// Accept the call request from the given requester.
    AcceptWebcam(UserId),
    /// Decline the call request from the given requester.
    RejectWebcam(UserId),
    /// Opaque negotiation payload (SDP, ICE) for the counterpart.
    SendWebcamSignal {
        user_id: UserId,
        data: serde_json::Value,
    },
    /// Hang up the call with the given user.
    EndWebcam(UserId),
    /// Keep-alive; answered with `pong`.
    Ping { client_time: u64 },
}

impl ClientEvent {
    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom(_) => "joinRoom",
            Self::LeaveRoom(_) => "leaveRoom",
            Self::SendMessage { .. } => "sendMessage",
            Self::SendPrivateMessage { .. } => "sendPrivateMessage",
            Self::RequestWebcam(_) => "requestWebcam",
            Self::AcceptWebcam(_) => "acceptWebcam",
            Self::RejectWebcam(_) => "rejectWebcam",
            Self::SendWebcamSignal { .. } => "sendWebcamSignal",
            Self::EndWebcam(_) => "endWebcam",
            Self::Ping { .. } => "ping",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// A persisted room message as broadcast to the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    pub id: MessageId,
    pub content: String,
    pub user_id: UserId,
    pub username: String,
    pub room_id: RoomId,
    pub created_at: DateTime<Utc>,
}

/// A persisted private message as broadcast to its channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateMessage {
    pub id: MessageId,
    pub content: String,
    pub user_id: UserId,
    pub username: String,
    pub recipient_id: UserId,
    pub created_at: DateTime<Utc>,
}

/// Everything the relay may push to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// Handshake accepted; the identity bound to this connection.
    Connected(UserIdentity),
    /// Someone entered a room this connection is in.
    UserJoined(UserIdentity),
    /// Someone left a room or channel this connection is in.
    UserLeft(UserId),
    /// A room message.
    Message(RoomMessage),
    /// A private message.
    PrivateMessage(PrivateMessage),
    /// Someone is asking for a call. `room_id` is set for room-wide asks.
    WebcamRequest {
        user_id: UserId,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        room_id: Option<RoomId>,
    },
    /// The named user accepted our request.
    WebcamAccepted(UserId),
    /// The named user declined our request.
    WebcamRejected(UserId),
    /// Negotiation payload from the named user, forwarded verbatim.
    WebcamSignal {
        user_id: UserId,
        data: serde_json::Value,
    },
    /// The call with the named user is over, or the request to them went
    /// unanswered.
    WebcamEnded(UserId),
    /// Answer to `ping`.
    Pong { client_time: u64, server_time: u64 },
    /// Something went wrong; `code` follows HTTP conventions.
    Error { code: u16, message: String },
}
