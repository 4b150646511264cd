//! Per-connection session state.
//!
//! A session moves through `Unauthenticated -> Authenticated -> Terminated`.
//! Its fields are owned exclusively by the connection's event-handling task;
//! nothing here needs a lock.

use std::collections::HashSet;

use tracing::warn;

use crate::connection::ConnectionId;
use crate::room::RoomId;

/// A verified user identity bound to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Stable user identifier.
    pub user_id: String,
    /// Display name.
    pub nickname: String,
}

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated,
    Terminated,
}

/// State for a single live connection.
#[derive(Debug)]
pub struct ConnectionSession {
    id: ConnectionId,
    identity: Option<Identity>,
    joined_rooms: HashSet<RoomId>,
    terminated: bool,
}

impl ConnectionSession {
    /// Create a new unauthenticated session.
    #[must_use]
    pub fn new(id: ConnectionId) -> Self {
        Self {
            id,
            identity: None,
            joined_rooms: HashSet::new(),
            terminated: false,
        }
    }

    /// The connection this session belongs to.
    #[must_use]
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// The bound identity, if authenticated.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        if self.terminated {
            SessionState::Terminated
        } else if self.identity.is_some() {
            SessionState::Authenticated
        } else {
            SessionState::Unauthenticated
        }
    }

    /// Whether the session has terminated.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Bind an identity to the session.
    ///
    /// A repeated `authenticate` overwrites the previous identity; callers
    /// should not rely on re-authentication semantics. Returns the replaced
    /// identity, if any.
    pub fn authenticate(&mut self, identity: Identity) -> Option<Identity> {
        let previous = self.identity.replace(identity);
        if previous.is_some() {
            warn!(connection = %self.id, "re-authentication replaced existing identity");
        }
        previous
    }

    /// Record a room join.
    ///
    /// Returns `true` if the room was not already joined.
    pub fn note_join(&mut self, room: RoomId) -> bool {
        self.joined_rooms.insert(room)
    }

    /// Record a room leave.
    ///
    /// Returns `true` if the room was joined.
    pub fn note_leave(&mut self, room: &str) -> bool {
        self.joined_rooms.remove(room)
    }

    /// Whether the session has joined a room.
    #[must_use]
    pub fn in_room(&self, room: &str) -> bool {
        self.joined_rooms.contains(room)
    }

    /// Number of joined rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.joined_rooms.len()
    }

    /// Iterate over the joined rooms.
    pub fn joined_rooms(&self) -> impl Iterator<Item = &RoomId> {
        self.joined_rooms.iter()
    }

    /// Terminal transition.
    ///
    /// Drains and returns the joined-room set so teardown can unwind each
    /// membership. After this, no further events are processed.
    pub fn terminate(&mut self) -> Vec<RoomId> {
        self.terminated = true;
        self.joined_rooms.drain().collect()
    }
}
