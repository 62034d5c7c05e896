//! Error types for the signaling layer.

use huddle_protocol::UserId;

/// Reasons a signaling operation was refused.
///
/// None of these reach the client; the hub logs them at debug and drops
/// the event.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignalError {
    /// A payload was sent between two users that never agreed to a call.
    #[error("no accepted call between {from} and {to}")]
    NoActiveCall { from: UserId, to: UserId },

    /// An accept named someone who has no request out to the accepting
    /// user, directly or to a room they are in.
    #[error("{requester} has no pending call request for {target}")]
    NoPendingRequest { requester: UserId, target: UserId },

    /// A user tried to call themselves.
    #[error("{0} cannot call themselves")]
    SelfCall(UserId),
}
