//! Membership bookkeeping.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use huddle_protocol::{ChannelId, RoomId};
use huddle_transport::ConnectionId;

/// Something a connection can be joined to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Scope {
    /// A room from the store. Joining one leaves all others.
    Room(RoomId),
    /// The private channel between two users. Additive.
    Channel(ChannelId),
}

impl Scope {
    pub fn is_room(&self) -> bool {
        matches!(self, Self::Room(_))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Room(id) => write!(f, "{id}"),
            Self::Channel(id) => write!(f, "channel {id}"),
        }
    }
}

/// A connection left a scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub scope: Scope,
    /// Who is still in the scope and should hear about it.
    pub remaining: Vec<ConnectionId>,
}

/// Outcome of [`RoomMembership::join_public_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicJoin {
    /// Rooms the connection was moved out of.
    pub left: Vec<Departure>,
    /// `false` if the connection was already in the room.
    pub newly_joined: bool,
    /// Everyone else in the room after the join.
    pub others: Vec<ConnectionId>,
}

/// Both directions of the connection ↔ scope relation.
///
/// `joined` and `presence` always describe the same set of pairs: every
/// mutation goes through `add` and `remove`, which update both. Empty
/// entries are dropped.
#[derive(Debug, Default)]
pub struct RoomMembership {
    joined: HashMap<ConnectionId, BTreeSet<Scope>>,
    presence: HashMap<Scope, BTreeSet<ConnectionId>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves `conn_id` into `room_id`, leaving every other room it was in.
    ///
    /// Private channels are untouched. Rejoining the current room changes
    /// nothing and reports `newly_joined: false`.
    pub fn join_public_room(&mut self, conn_id: ConnectionId, room_id: RoomId) -> PublicJoin {
        let target = Scope::Room(room_id);

        let stale: Vec<Scope> = self
            .joined
            .get(&conn_id)
            .map(|scopes| {
                scopes
                    .iter()
                    .filter(|s| s.is_room() && **s != target)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        let left: Vec<Departure> = stale
            .into_iter()
            .filter_map(|scope| self.remove(conn_id, &scope))
            .collect();

        let newly_joined = self.add(conn_id, target.clone());
        if newly_joined {
            tracing::info!(%conn_id, %room_id, "joined room");
        }

        let others: Vec<ConnectionId> = self
            .presence
            .get(&target)
            .map(|members| members.iter().copied().filter(|c| *c != conn_id).collect())
            .unwrap_or_default();

        PublicJoin {
            left,
            newly_joined,
            others,
        }
    }

    /// Takes `conn_id` out of `room_id`. `None` if it wasn't in it.
    pub fn leave_room(&mut self, conn_id: ConnectionId, room_id: RoomId) -> Option<Departure> {
        let departure = self.remove(conn_id, &Scope::Room(room_id))?;
        tracing::info!(%conn_id, %room_id, "left room");
        Some(departure)
    }

    /// Adds `conn_id` to a private channel. Returns `false` if it was
    /// already there.
    pub fn join_private_channel(&mut self, conn_id: ConnectionId, channel_id: ChannelId) -> bool {
        let added = self.add(conn_id, Scope::Channel(channel_id.clone()));
        if added {
            tracing::debug!(%conn_id, channel = %channel_id, "joined private channel");
        }
        added
    }

    /// Drops every membership of `conn_id`, rooms and channels alike.
    ///
    /// Departures come back in scope order, one per scope.
    pub fn remove_connection(&mut self, conn_id: ConnectionId) -> Vec<Departure> {
        let Some(scopes) = self.joined.remove(&conn_id) else {
            return Vec::new();
        };

        scopes
            .into_iter()
            .map(|scope| {
                let remaining = match self.presence.get_mut(&scope) {
                    Some(members) => {
                        members.remove(&conn_id);
                        let remaining: Vec<_> = members.iter().copied().collect();
                        if members.is_empty() {
                            self.presence.remove(&scope);
                        }
                        remaining
                    }
                    None => Vec::new(),
                };
                Departure { scope, remaining }
            })
            .collect()
    }

    /// Current members of `scope`, in connection-id order.
    pub fn members(&self, scope: &Scope) -> Vec<ConnectionId> {
        self.presence
            .get(scope)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, conn_id: ConnectionId, scope: &Scope) -> bool {
        self.joined
            .get(&conn_id)
            .is_some_and(|scopes| scopes.contains(scope))
    }

    /// Every scope `conn_id` is in.
    pub fn scopes_of(&self, conn_id: ConnectionId) -> Vec<Scope> {
        self.joined
            .get(&conn_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The public room `conn_id` is in, if any.
    pub fn current_room(&self, conn_id: ConnectionId) -> Option<RoomId> {
        self.joined.get(&conn_id)?.iter().find_map(|s| match s {
            Scope::Room(id) => Some(*id),
            Scope::Channel(_) => None,
        })
    }

    fn add(&mut self, conn_id: ConnectionId, scope: Scope) -> bool {
        let inserted = self.joined.entry(conn_id).or_default().insert(scope.clone());
        if inserted {
            self.presence.entry(scope).or_default().insert(conn_id);
        }
        inserted
    }

    fn remove(&mut self, conn_id: ConnectionId, scope: &Scope) -> Option<Departure> {
        let scopes = self.joined.get_mut(&conn_id)?;
        if !scopes.remove(scope) {
            return None;
        }
        if scopes.is_empty() {
            self.joined.remove(&conn_id);
        }

        let members = self.presence.get_mut(scope)?;
        members.remove(&conn_id);
        let remaining: Vec<_> = members.iter().copied().collect();
        if members.is_empty() {
            self.presence.remove(scope);
        }

        Some(Departure {
            scope: scope.clone(),
            remaining,
        })
    }
}
