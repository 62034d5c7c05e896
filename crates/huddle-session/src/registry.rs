//! The live connection table.
//!
//! Every authenticated connection has an entry here from registration until
//! it disconnects. Each entry holds the connection's identity and its
//! outbox, the sending half of the channel its writer task drains.
//!
//! Alongside the entries sits a routing index, user → connection, used when
//! something must reach a *user* rather than a specific socket (private
//! messages, call signaling). The most recent connection for a user wins
//! the route. Older connections stay registered and keep receiving whatever
//! their own room memberships bring them.
//!
//! Like the rest of the coordination state, the registry is a plain
//! single-owner structure; the server guards it with its hub mutex.

use std::collections::HashMap;

use huddle_protocol::{ServerEvent, UserId, UserIdentity};
use huddle_transport::ConnectionId;
use tokio::sync::mpsc;

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

struct ConnectionEntry {
    identity: UserIdentity,
    outbox: Outbox,
}

/// Outcome of [`ConnectionRegistry::unregister`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unregistered {
    /// Who the connection belonged to.
    pub identity: UserIdentity,
    /// Whether the user is still reachable through another connection
    /// (a newer one took over the route before this one closed).
    pub still_routed: bool,
}

/// Tracks live connections and routes user ids to them.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    /// Kept in sync with `connections`: every value is a key there.
    routes: HashMap<UserId, ConnectionId>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection and makes it the route for its user.
    ///
    /// Returns the connection that previously held the route, if any. That
    /// connection is *not* closed.
    pub fn register(
        &mut self,
        conn_id: ConnectionId,
        identity: UserIdentity,
        outbox: Outbox,
    ) -> Option<ConnectionId> {
        let user_id = identity.id;
        self.connections
            .insert(conn_id, ConnectionEntry { identity, outbox });
        let replaced = self.routes.insert(user_id, conn_id);

        match replaced {
            Some(old) => tracing::info!(
                %conn_id, %user_id, replaced = %old,
                "connection registered, took over route"
            ),
            None => tracing::info!(%conn_id, %user_id, "connection registered"),
        }
        replaced
    }

    /// Removes a connection.
    ///
    /// The user's route is dropped only if it still points at this
    /// connection. Returns `None` if the connection was not registered, so
    /// calling it twice is harmless.
    pub fn unregister(&mut self, conn_id: ConnectionId) -> Option<Unregistered> {
        let entry = self.connections.remove(&conn_id)?;
        let user_id = entry.identity.id;

        let still_routed = match self.routes.get(&user_id) {
            Some(routed) if *routed == conn_id => {
                self.routes.remove(&user_id);
                false
            }
            Some(_) => true,
            None => false,
        };

        tracing::info!(%conn_id, %user_id, still_routed, "connection unregistered");
        Some(Unregistered {
            identity: entry.identity,
            still_routed,
        })
    }

    /// The routed connection for `user_id`.
    pub fn lookup(&self, user_id: UserId) -> Option<ConnectionId> {
        self.routes.get(&user_id).copied()
    }

    pub fn identity(&self, conn_id: ConnectionId) -> Option<&UserIdentity> {
        self.connections.get(&conn_id).map(|e| &e.identity)
    }

    /// Queues `event` on a connection's outbox.
    ///
    /// Returns `false` if the connection is unknown or its writer has
    /// already gone away. Never blocks.
    pub fn send(&self, conn_id: ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(&conn_id) {
            Some(entry) => entry.outbox.send(event).is_ok(),
            None => false,
        }
    }

    /// Queues `event` on the routed connection of `user_id`.
    pub fn send_to_user(&self, user_id: UserId, event: ServerEvent) -> bool {
        match self.lookup(user_id) {
            Some(conn_id) => self.send(conn_id, event),
            None => {
                tracing::debug!(%user_id, "no routed connection, event dropped");
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
