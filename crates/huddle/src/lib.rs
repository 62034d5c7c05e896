//! # Huddle
//!
//! Real-time relay for a multi-room chat with one-to-one video calls.
//!
//! Clients hold one WebSocket each. The relay authenticates the connection
//! against the user store, tracks which rooms and private channels it is
//! in, fans chat messages out after persisting them, and forwards call
//! negotiation payloads between the two parties of a call.
//!
//! ```text
//! huddle-transport  → frames
//! huddle-protocol   → events
//! huddle-session    → who is connected
//! huddle-room       → who is in which room / channel
//! huddle-signal     → which calls are allowed
//! huddle (this)     → Hub, router, handler, server
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use huddle::prelude::*;
//!
//! # async fn run() -> Result<(), HuddleError> {
//! let store = Arc::new(MemoryStore::new());
//! let (alice, token) = store.add_user("alice").await;
//! println!("{} connects with sessionId {token}", alice.username);
//!
//! let server = HuddleServerBuilder::new()
//!     .bind("127.0.0.1:9100")
//!     .build(StoreAuthenticator::new(Arc::clone(&store)), store)
//!     .await?;
//! server.run().await
//! # }
//! ```

pub mod config;
mod error;
mod handler;
pub mod hub;
pub mod router;
mod server;

pub use error::HuddleError;
pub use server::{HuddleServer, HuddleServerBuilder, ServerConfig};

pub mod prelude {
    pub use crate::config::{HuddleCliArgs, HuddleConfig, SeedUser};
    pub use crate::hub::Hub;
    pub use crate::{HuddleError, HuddleServer, HuddleServerBuilder, ServerConfig};

    pub use huddle_protocol::{
        CallContext, ChannelId, ClientEvent, Codec, Handshake, JsonCodec, MessageId,
        PROTOCOL_VERSION, PrivateMessage, ProtocolError, RoomId, RoomMessage, ServerEvent,
        UserId, UserIdentity, WebcamTarget,
    };
    pub use huddle_session::{Authenticator, SessionError, StoreAuthenticator};
    pub use huddle_signal::CallConfig;
    pub use huddle_store::{
        MemoryStore, MessageStore, MessageTarget, NewMessage, SessionStore, StoreError,
        StoredMessage,
    };
    pub use huddle_transport::ConnectionId;
}
