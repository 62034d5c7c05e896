//! Error types for the session layer.

/// Why a connection could not be authenticated.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No active session matches the token (missing, empty, unknown or
    /// expired).
    #[error("invalid session")]
    InvalidSession,

    /// The user store could not be asked.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

impl SessionError {
    /// The code sent to the client in the `error` frame.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidSession => 401,
            Self::StoreUnavailable(_) => 503,
        }
    }
}
