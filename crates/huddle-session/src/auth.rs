//! Authentication hook run once per connection, during the handshake.
//!
//! The relay never stores credentials. [`Authenticator`] is the seam: the
//! server calls it with the token from the handshake frame and either binds
//! the returned identity to the connection or refuses it.

use std::future::Future;
use std::sync::Arc;

use huddle_protocol::UserIdentity;
use huddle_store::SessionStore;

use crate::SessionError;

/// Validates a client's session token and returns their identity.
///
/// ```rust
/// use huddle_protocol::{UserId, UserIdentity};
/// use huddle_session::{Authenticator, SessionError};
///
/// /// Treats the token as "<id>:<name>". Tests only.
/// struct InlineAuthenticator;
///
/// impl Authenticator for InlineAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<UserIdentity, SessionError> {
///         let (id, name) = token.split_once(':').ok_or(SessionError::InvalidSession)?;
///         let id: u64 = id.parse().map_err(|_| SessionError::InvalidSession)?;
///         Ok(UserIdentity { id: UserId(id), username: name.to_owned() })
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Resolves `token` to an identity.
    ///
    /// # Errors
    /// - [`SessionError::InvalidSession`]: no active session matches.
    /// - [`SessionError::StoreUnavailable`]: the lookup itself failed.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<UserIdentity, SessionError>> + Send;
}

/// An [`Authenticator`] that asks a [`SessionStore`].
///
/// On success it also fires `touch_activity` on a separate task. A failed
/// touch is logged and otherwise ignored.
pub struct StoreAuthenticator<S> {
    store: Arc<S>,
}

impl<S> StoreAuthenticator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

impl<S: SessionStore> Authenticator for StoreAuthenticator<S> {
    async fn authenticate(&self, token: &str) -> Result<UserIdentity, SessionError> {
        if token.is_empty() {
            return Err(SessionError::InvalidSession);
        }

        let identity = self
            .store
            .resolve_session(token)
            .await
            .map_err(|e| SessionError::StoreUnavailable(e.to_string()))?
            .ok_or(SessionError::InvalidSession)?;

        let store = Arc::clone(&self.store);
        let user_id = identity.id;
        tokio::spawn(async move {
            if let Err(e) = store.touch_activity(user_id).await {
                tracing::warn!(%user_id, error = %e, "failed to touch last-active");
            }
        });

        Ok(identity)
    }
}
