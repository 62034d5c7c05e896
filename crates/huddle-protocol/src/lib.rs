//! Wire protocol for Huddle.
//!
//! This crate defines the language clients and the relay speak:
//!
//! - **Identifiers** ([`UserId`], [`RoomId`], [`ChannelId`]) and the
//!   canonical private-channel resolver ([`ChannelId::between`]).
//! - **Events** ([`Handshake`], [`ClientEvent`], [`ServerEvent`]): every
//!   frame after the handshake is `{"event": <name>, "data": <payload>}`.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (events) → Session / Room / Signal
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use events::{
    CallContext, ClientEvent, Handshake, PROTOCOL_VERSION, PrivateMessage,
    RoomMessage, ServerEvent, WebcamTarget,
};
pub use types::{ChannelId, MessageId, RoomId, UserId, UserIdentity};
