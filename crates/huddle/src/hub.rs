//! The coordination point for all shared relay state.
//!
//! [`Hub`] owns the connection registry, room membership and call table,
//! and is the only thing that mutates them. The server keeps one hub behind
//! a `tokio::sync::Mutex`; every method here is synchronous, so the lock is
//! never held across an await. Deliveries are pushes onto per-connection
//! outboxes and never block.
//!
//! Methods that act on behalf of a connection take its [`ConnectionId`] and
//! look up the identity in the registry. If the connection has already
//! been unregistered the call does nothing.

use huddle_protocol::{
    CallContext, ChannelId, PrivateMessage, RoomId, RoomMessage, ServerEvent, UserId,
    UserIdentity,
};
use huddle_room::{Departure, RoomMembership, Scope};
use huddle_session::{ConnectionRegistry, Outbox};
use huddle_signal::{CallConfig, CallState, CallTable};
use huddle_transport::ConnectionId;

/// Registry, membership and call state behind one lock.
pub struct Hub {
    registry: ConnectionRegistry,
    rooms: RoomMembership,
    calls: CallTable,
}

impl Hub {
    pub fn new(call_config: CallConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            rooms: RoomMembership::new(),
            calls: CallTable::new(call_config),
        }
    }

    // -----------------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------------

    /// Registers an authenticated connection.
    pub fn connect(&mut self, conn_id: ConnectionId, identity: UserIdentity, outbox: Outbox) {
        self.registry.register(conn_id, identity, outbox);
    }

    /// Unwinds everything a connection held.
    ///
    /// Every room and private channel it was in hears `userLeft` once. If
    /// the user is no longer reachable through another connection, their
    /// calls are torn down and each counterpart gets `webcamEnded`.
    /// Calling this for an unknown or already removed connection does
    /// nothing.
    pub fn disconnect(&mut self, conn_id: ConnectionId) {
        let Some(gone) = self.registry.unregister(conn_id) else {
            return;
        };
        let user_id = gone.identity.id;

        for departure in self.rooms.remove_connection(conn_id) {
            self.notify_departure(user_id, &departure);
        }

        if !gone.still_routed {
            for other in self.calls.drop_user(user_id) {
                self.registry
                    .send_to_user(other, ServerEvent::WebcamEnded(user_id));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Rooms and channels
    // -----------------------------------------------------------------------

    /// Moves a connection into `room_id`.
    ///
    /// Rooms it leaves on the way hear `userLeft`. The new room hears
    /// `userJoined` only on an actual join, never on a rejoin, and the
    /// user's own other connections are not told about themselves.
    pub fn join_room(&mut self, conn_id: ConnectionId, room_id: RoomId) {
        let Some(identity) = self.registry.identity(conn_id).cloned() else {
            return;
        };

        let join = self.rooms.join_public_room(conn_id, room_id);
        for departure in &join.left {
            self.notify_departure(identity.id, departure);
        }
        if join.newly_joined {
            for other in join.others {
                if !self.is_connection_of(other, identity.id) {
                    self.registry
                        .send(other, ServerEvent::UserJoined(identity.clone()));
                }
            }
        }
    }

    pub fn leave_room(&mut self, conn_id: ConnectionId, room_id: RoomId) {
        let Some(user_id) = self.user_of(conn_id) else {
            return;
        };
        if let Some(departure) = self.rooms.leave_room(conn_id, room_id) {
            self.notify_departure(user_id, &departure);
        }
    }

    /// Joins the sender and, if online, the recipient's routed connection
    /// to their private channel. Returns the channel, or `None` if the
    /// sender is gone.
    pub fn open_private_channel(
        &mut self,
        conn_id: ConnectionId,
        recipient_id: UserId,
    ) -> Option<ChannelId> {
        let sender_id = self.user_of(conn_id)?;
        let channel = ChannelId::between(sender_id, recipient_id);

        self.rooms.join_private_channel(conn_id, channel.clone());
        if let Some(recipient_conn) = self.registry.lookup(recipient_id) {
            self.rooms.join_private_channel(recipient_conn, channel.clone());
        }
        Some(channel)
    }

    /// Sends a persisted message to every member of the room, the author
    /// included. Returns how many connections it was queued for.
    pub fn broadcast_room(&self, message: RoomMessage) -> usize {
        let scope = Scope::Room(message.room_id);
        self.broadcast(&scope, &ServerEvent::Message(message))
    }

    /// Sends a persisted private message to the channel's current members.
    pub fn broadcast_private(&self, channel: ChannelId, message: PrivateMessage) -> usize {
        self.broadcast(&Scope::Channel(channel), &ServerEvent::PrivateMessage(message))
    }

    // -----------------------------------------------------------------------
    // Signaling
    // -----------------------------------------------------------------------

    /// Asks for a call.
    ///
    /// A room-wide ask goes to every member of the room except the
    /// requester's own connections. It records the room so a member can
    /// accept, but no call exists yet. A direct ask records a pending call
    /// and goes to the target's routed connection.
    pub fn request_call(&mut self, conn_id: ConnectionId, context: CallContext) {
        let Some(identity) = self.registry.identity(conn_id).cloned() else {
            return;
        };

        match context {
            CallContext::Room(room_id) => {
                self.calls.request_room(identity.id, room_id);
                let event = ServerEvent::WebcamRequest {
                    user_id: identity.id,
                    username: identity.username.clone(),
                    room_id: Some(room_id),
                };
                for member in self.rooms.members(&Scope::Room(room_id)) {
                    if !self.is_connection_of(member, identity.id) {
                        self.registry.send(member, event.clone());
                    }
                }
            }
            CallContext::User(target) => {
                if let Err(e) = self.calls.request(identity.id, target) {
                    tracing::debug!(%conn_id, error = %e, "call request dropped");
                    return;
                }
                self.registry.send_to_user(
                    target,
                    ServerEvent::WebcamRequest {
                        user_id: identity.id,
                        username: identity.username,
                        room_id: None,
                    },
                );
            }
        }
    }

    /// The connection's user accepts `requester`'s call. Only the
    /// requester's routed connection hears about it.
    ///
    /// Dropped if the requester is offline or never asked: directly, or to
    /// the room this connection is in.
    pub fn accept_call(&mut self, conn_id: ConnectionId, requester: UserId) {
        let Some(user_id) = self.user_of(conn_id) else {
            return;
        };
        if self.registry.lookup(requester).is_none() {
            tracing::debug!(%conn_id, %requester, "accept for offline requester dropped");
            return;
        }
        let current_room = self.rooms.current_room(conn_id);
        match self.calls.accept(user_id, requester, current_room) {
            Ok(_) => {
                self.registry
                    .send_to_user(requester, ServerEvent::WebcamAccepted(user_id));
            }
            Err(e) => tracing::debug!(%conn_id, error = %e, "accept dropped"),
        }
    }

    /// The connection's user declines `requester`'s call.
    pub fn reject_call(&mut self, conn_id: ConnectionId, requester: UserId) {
        let Some(user_id) = self.user_of(conn_id) else {
            return;
        };
        if self.calls.reject(user_id, requester) == CallState::Idle {
            tracing::debug!(%user_id, %requester, "reject with no pending request");
        }
        self.registry
            .send_to_user(requester, ServerEvent::WebcamRejected(user_id));
    }

    /// Forwards an opaque negotiation payload to the other participant of
    /// an accepted call. Anything else is dropped.
    pub fn relay_signal(&mut self, conn_id: ConnectionId, to: UserId, data: serde_json::Value) {
        let Some(user_id) = self.user_of(conn_id) else {
            return;
        };
        if let Err(e) = self.calls.signal(user_id, to) {
            tracing::debug!(%conn_id, error = %e, "signal dropped");
            return;
        }
        self.registry
            .send_to_user(to, ServerEvent::WebcamSignal { user_id, data });
    }

    /// Hangs up the call with `other`.
    pub fn end_call(&mut self, conn_id: ConnectionId, other: UserId) {
        let Some(user_id) = self.user_of(conn_id) else {
            return;
        };
        if self.calls.end(user_id, other) {
            self.registry
                .send_to_user(other, ServerEvent::WebcamEnded(user_id));
        }
    }

    /// Reclaims call requests nobody answered in time and tells each
    /// requester. Returns how many were reclaimed.
    pub fn expire_call_requests(&mut self) -> usize {
        let expired = self.calls.expire_stale();
        for key in &expired {
            self.registry
                .send_to_user(key.requester, ServerEvent::WebcamEnded(key.target));
        }
        expired.len()
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomMembership {
        &self.rooms
    }

    pub fn calls(&self) -> &CallTable {
        &self.calls
    }

    fn user_of(&self, conn_id: ConnectionId) -> Option<UserId> {
        self.registry.identity(conn_id).map(|i| i.id)
    }

    fn is_connection_of(&self, conn_id: ConnectionId, user_id: UserId) -> bool {
        self.user_of(conn_id) == Some(user_id)
    }

    fn broadcast(&self, scope: &Scope, event: &ServerEvent) -> usize {
        self.rooms
            .members(scope)
            .into_iter()
            .filter(|member| self.registry.send(*member, event.clone()))
            .count()
    }

    fn notify_departure(&self, user_id: UserId, departure: &Departure) {
        for member in &departure.remaining {
            self.registry.send(*member, ServerEvent::UserLeft(user_id));
        }
    }
}
