//! Unified error type for the relay.

use huddle_protocol::ProtocolError;
use huddle_session::SessionError;
use huddle_signal::SignalError;
use huddle_store::StoreError;
use huddle_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error wrapping each layer's error.
///
/// `#[from]` lets `?` convert layer errors directly.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl HuddleError {
    /// The `error` frame code a client sees for this failure, if any.
    pub fn client_code(&self) -> Option<u16> {
        match self {
            Self::Protocol(_) => Some(400),
            Self::Session(e) => Some(e.code()),
            _ => None,
        }
    }
}
