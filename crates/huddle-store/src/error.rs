//! Error types for the store collaborators.

/// Failures reported by a [`SessionStore`](crate::SessionStore) or
/// [`MessageStore`](crate::MessageStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store was reached but refused the write.
    #[error("store rejected the write: {0}")]
    Rejected(String),
}
