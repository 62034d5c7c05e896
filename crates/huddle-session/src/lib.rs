//! Who is connected, and as whom.
//!
//! 1. **Authentication**: turning a session token into a
//!    [`UserIdentity`](huddle_protocol::UserIdentity) ([`Authenticator`],
//!    [`StoreAuthenticator`]).
//! 2. **Registry**: the table of live connections and the user → connection
//!    routing used for direct delivery ([`ConnectionRegistry`]).
//!
//! ```text
//! Hub (above)  ← routes events to outboxes found here
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol / Store (below)
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;

pub use auth::{Authenticator, StoreAuthenticator};
pub use error::SessionError;
pub use registry::{ConnectionRegistry, Outbox, Unregistered};
