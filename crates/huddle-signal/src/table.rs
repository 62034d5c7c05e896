//! The per-pair call state machine.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use huddle_protocol::{RoomId, UserId};

use crate::SignalError;

// ---------------------------------------------------------------------------
// CallConfig
// ---------------------------------------------------------------------------

/// Settings for the call table.
#[derive(Debug, Clone)]
pub struct CallConfig {
    /// How long a request may go unanswered before
    /// [`CallTable::expire_stale`] reclaims it. `None` keeps requests
    /// until one side answers or leaves.
    ///
    /// Default: 30 seconds.
    pub request_timeout: Option<Duration>,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

// ---------------------------------------------------------------------------
// CallState
// ---------------------------------------------------------------------------

/// Where a (requester, target) pair stands.
///
/// ```text
///   Idle ──request──→ Requested ──accept──→ Accepted ──signal──→ Active
///                         │                                        │
///                         └──reject──→ Rejected (discarded)        └─ signal…
///
///   any ──end / disconnect / timeout──→ Idle
/// ```
///
/// `Idle` and `Rejected` are never stored; they are what the table reports
/// for a pair with no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Requested,
    Accepted,
    Rejected,
    Active,
}

/// Ordered pair identifying a call: who asked, and who was asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub requester: UserId,
    pub target: UserId,
}

impl CallKey {
    pub fn new(requester: UserId, target: UserId) -> Self {
        Self { requester, target }
    }

    fn involves(&self, user_id: UserId) -> bool {
        self.requester == user_id || self.target == user_id
    }

    fn counterpart(&self, user_id: UserId) -> UserId {
        if self.requester == user_id {
            self.target
        } else {
            self.requester
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CallSession {
    state: CallState,
    since: Instant,
}

/// A request sent to everyone in a room. One per requester; a newer one
/// replaces it.
#[derive(Debug, Clone, Copy)]
struct RoomRequest {
    room_id: RoomId,
    since: Instant,
}

// ---------------------------------------------------------------------------
// CallTable
// ---------------------------------------------------------------------------

/// All calls currently being negotiated or in progress.
///
/// Plain single-owner structure, guarded by the hub's mutex.
#[derive(Debug, Default)]
pub struct CallTable {
    sessions: HashMap<CallKey, CallSession>,
    room_requests: HashMap<UserId, RoomRequest>,
    config: CallConfig,
}

impl CallTable {
    pub fn new(config: CallConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            room_requests: HashMap::new(),
            config,
        }
    }

    /// Records a point-to-point request from `from` to `to`.
    ///
    /// A repeated request restarts the pending one. An established call
    /// between the same pair is replaced by the new request.
    ///
    /// # Errors
    /// [`SignalError::SelfCall`] if `from == to`.
    pub fn request(&mut self, from: UserId, to: UserId) -> Result<(), SignalError> {
        if from == to {
            return Err(SignalError::SelfCall(from));
        }
        self.sessions.remove(&CallKey::new(to, from));
        self.sessions.insert(
            CallKey::new(from, to),
            CallSession {
                state: CallState::Requested,
                since: Instant::now(),
            },
        );
        tracing::debug!(requester = %from, target = %to, "call requested");
        Ok(())
    }

    /// Records that `from` asked everyone in `room_id` for a call.
    ///
    /// No call exists until someone in the room accepts. Any earlier
    /// room-wide request from `from` is replaced.
    pub fn request_room(&mut self, from: UserId, room_id: RoomId) {
        self.room_requests.insert(
            from,
            RoomRequest {
                room_id,
                since: Instant::now(),
            },
        );
        tracing::debug!(requester = %from, %room_id, "room call requested");
    }

    /// `target` accepts the call `requester` asked for.
    ///
    /// `target_room` is the public room the accepting user is in. With no
    /// direct request stored, the call is created in `Accepted` only if
    /// `requester` has a room-wide request out to that room. Accepting a
    /// call that is already accepted or active changes nothing. Returns
    /// the resulting state.
    ///
    /// # Errors
    /// - [`SignalError::SelfCall`] if `target == requester`.
    /// - [`SignalError::NoPendingRequest`] if `requester` never asked.
    pub fn accept(
        &mut self,
        target: UserId,
        requester: UserId,
        target_room: Option<RoomId>,
    ) -> Result<CallState, SignalError> {
        if target == requester {
            return Err(SignalError::SelfCall(target));
        }

        let key = CallKey::new(requester, target);
        if let Some(session) = self.sessions.get_mut(&key) {
            if session.state == CallState::Requested {
                session.state = CallState::Accepted;
                session.since = Instant::now();
                tracing::debug!(%requester, %target, "call accepted");
            }
            return Ok(session.state);
        }

        let in_asked_room = target_room.is_some() && self.room_request(requester) == target_room;
        if !in_asked_room {
            return Err(SignalError::NoPendingRequest { requester, target });
        }

        self.sessions.insert(
            key,
            CallSession {
                state: CallState::Accepted,
                since: Instant::now(),
            },
        );
        tracing::debug!(%requester, %target, "room call accepted");
        Ok(CallState::Accepted)
    }

    /// `target` declines the call `requester` asked for.
    ///
    /// Returns [`CallState::Rejected`] if a pending request was discarded,
    /// [`CallState::Idle`] if there was nothing pending (room-wide
    /// requests, or a call that already moved past `Requested`, which is
    /// left alone).
    pub fn reject(&mut self, target: UserId, requester: UserId) -> CallState {
        let key = CallKey::new(requester, target);
        match self.sessions.get(&key) {
            Some(session) if session.state == CallState::Requested => {
                self.sessions.remove(&key);
                tracing::debug!(%requester, %target, "call rejected");
                CallState::Rejected
            }
            _ => CallState::Idle,
        }
    }

    /// Checks that `from` may send a negotiation payload to `to`, and marks
    /// the call active.
    ///
    /// Either side may signal once the call is accepted.
    ///
    /// # Errors
    /// [`SignalError::NoActiveCall`] if the pair has no accepted or active
    /// call.
    pub fn signal(&mut self, from: UserId, to: UserId) -> Result<(), SignalError> {
        for key in [CallKey::new(from, to), CallKey::new(to, from)] {
            if let Some(session) = self.sessions.get_mut(&key) {
                match session.state {
                    CallState::Accepted => {
                        session.state = CallState::Active;
                        tracing::debug!(requester = %key.requester, target = %key.target, "call active");
                        return Ok(());
                    }
                    CallState::Active => return Ok(()),
                    _ => {}
                }
            }
        }
        Err(SignalError::NoActiveCall { from, to })
    }

    /// Tears down whatever exists between `a` and `b`, in either
    /// direction. Returns `true` if anything was removed.
    pub fn end(&mut self, a: UserId, b: UserId) -> bool {
        let forward = self.sessions.remove(&CallKey::new(a, b)).is_some();
        let backward = self.sessions.remove(&CallKey::new(b, a)).is_some();
        forward || backward
    }

    /// Removes every call `user_id` takes part in.
    ///
    /// Returns the other participants, each once.
    pub fn drop_user(&mut self, user_id: UserId) -> Vec<UserId> {
        self.room_requests.remove(&user_id);
        let mut counterparts = Vec::new();
        self.sessions.retain(|key, _| {
            if key.involves(user_id) {
                let other = key.counterpart(user_id);
                if !counterparts.contains(&other) {
                    counterparts.push(other);
                }
                false
            } else {
                true
            }
        });
        if !counterparts.is_empty() {
            tracing::debug!(%user_id, calls = counterparts.len(), "calls dropped");
        }
        counterparts
    }

    /// Discards requests that went unanswered for longer than the
    /// configured timeout and returns the keys of the direct ones.
    /// Stale room-wide requests are dropped without a key.
    ///
    /// Call periodically. Does nothing when the timeout is disabled.
    pub fn expire_stale(&mut self) -> Vec<CallKey> {
        let Some(timeout) = self.config.request_timeout else {
            return Vec::new();
        };

        let expired: Vec<CallKey> = self
            .sessions
            .iter()
            .filter(|(_, s)| s.state == CallState::Requested && s.since.elapsed() >= timeout)
            .map(|(key, _)| *key)
            .collect();

        for key in &expired {
            self.sessions.remove(key);
            tracing::info!(requester = %key.requester, target = %key.target, "call request timed out");
        }
        self.room_requests
            .retain(|_, request| request.since.elapsed() < timeout);
        expired
    }

    /// State of the call `requester` asked `target` for.
    pub fn state(&self, requester: UserId, target: UserId) -> CallState {
        self.sessions
            .get(&CallKey::new(requester, target))
            .map_or(CallState::Idle, |s| s.state)
    }

    /// The room `requester` last asked for a call, if still pending.
    pub fn room_request(&self, requester: UserId) -> Option<RoomId> {
        self.room_requests.get(&requester).map(|r| r.room_id)
    }

    /// Number of stored calls. Room-wide requests are not counted.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
