//! Call negotiation state for the signaling relay.
//!
//! The relay forwards opaque WebRTC-style payloads between two users, but
//! only once one has asked and the other has said yes. [`CallTable`]
//! tracks that handshake per (requester, target) pair. It does not deliver
//! anything; the hub asks it whether a delivery is allowed and what to
//! clean up when someone leaves.

mod error;
mod table;

pub use error::SignalError;
pub use table::{CallConfig, CallKey, CallState, CallTable};
