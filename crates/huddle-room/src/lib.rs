//! Room and private-channel membership.
//!
//! A connection sits in at most one public room at a time and in any number
//! of private channels. [`RoomMembership`] keeps both directions of that
//! relation (connection → scopes, scope → connections) and reports what
//! each mutation changed so the caller can notify the right people.
//!
//! The crate does no I/O and sends nothing itself.

mod membership;

pub use membership::{Departure, PublicJoin, RoomMembership, Scope};
