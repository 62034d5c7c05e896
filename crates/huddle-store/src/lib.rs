//! The relay's view of persistence.
//!
//! Users, rooms and message history live in an external store owned by the
//! HTTP side of the application. The relay only needs three calls from it,
//! split across two traits:
//!
//! - [`SessionStore`]: resolve a session token, touch last-active.
//! - [`MessageStore`]: persist a chat message and get back its id and
//!   timestamp.
//!
//! [`MemoryStore`] implements both for the dev binary and for tests.

#![allow(async_fn_in_trait)]

mod error;
mod memory;
mod traits;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use traits::{MessageStore, MessageTarget, NewMessage, SessionStore, StoredMessage};
