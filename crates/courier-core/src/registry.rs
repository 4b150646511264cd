//! Room registry and event fan-out.
//!
//! The registry is the only structure shared across connection tasks. It
//! tracks room membership and each connection's outbound mailbox, and fans
//! events out to room members without ever blocking on a slow recipient.

use std::sync::Arc;

use courier_protocol::ServerEvent;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::connection::{ConnectionId, Mailbox};
use crate::room::{validate_room_name, Room, RoomId};

/// Pseudo-room holding every registered connection.
///
/// Process-wide broadcasts (`user_online`, the global `user_offline`) fan
/// out through this room with the same machinery as chat rooms. The `$`
/// prefix is rejected by [`validate_room_name`], so clients cannot join it.
pub const GLOBAL_ROOM: &str = "$connections";

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid room name.
    #[error("invalid room name: {0}")]
    InvalidRoom(&'static str),
}

/// Concurrent room membership and delivery registry.
///
/// Rooms are created lazily on first join and pruned eagerly when the last
/// member leaves; a join racing a prune simply recreates the entry.
pub struct RoomRegistry {
    /// Rooms indexed by name.
    rooms: DashMap<RoomId, Room>,
    /// Outbound mailboxes indexed by connection.
    mailboxes: DashMap<ConnectionId, Mailbox>,
}

impl RoomRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            mailboxes: DashMap::new(),
        }
    }

    /// Register a connection's mailbox and add it to the global pseudo-room.
    pub fn register(&self, connection_id: ConnectionId, mailbox: Mailbox) {
        self.rooms
            .entry(GLOBAL_ROOM.to_string())
            .or_default()
            .join(connection_id.clone());
        self.mailboxes.insert(connection_id.clone(), mailbox);
        debug!(connection = %connection_id, "connection registered");
    }

    /// Remove a connection's mailbox and its global-room membership.
    ///
    /// Chat-room memberships are not touched here: the session owns its
    /// joined-room set and unwinds them explicitly during teardown.
    pub fn deregister(&self, connection_id: &ConnectionId) {
        self.mailboxes.remove(connection_id);
        self.leave(GLOBAL_ROOM, connection_id);
        debug!(connection = %connection_id, "connection deregistered");
    }

    /// Add a connection to a room, creating the room if needed.
    ///
    /// Idempotent: joining a room twice leaves a single membership entry.
    /// Returns the member count after the join.
    ///
    /// # Errors
    ///
    /// Returns an error if the room name is invalid.
    pub fn join(&self, room: &str, connection_id: ConnectionId) -> Result<usize, RegistryError> {
        validate_room_name(room).map_err(RegistryError::InvalidRoom)?;

        let mut entry = self.rooms.entry(room.to_string()).or_insert_with(|| {
            debug!(room, "creating room");
            Room::new()
        });
        entry.join(connection_id.clone());
        let count = entry.member_count();

        debug!(room, connection = %connection_id, members = count, "joined room");
        Ok(count)
    }

    /// Remove a connection from a room, pruning the room if it empties.
    ///
    /// Returns `true` if the connection was a member. Leaving a room one is
    /// not a member of is a no-op.
    pub fn leave(&self, room: &str, connection_id: &ConnectionId) -> bool {
        let Some(mut entry) = self.rooms.get_mut(room) else {
            return false;
        };

        let removed = entry.leave(connection_id);
        let empty = entry.is_empty();
        // Release the shard lock before removing the room.
        drop(entry);

        if removed {
            debug!(room, connection = %connection_id, "left room");
        }
        if empty {
            self.rooms.remove_if(room, |_, r| r.is_empty());
            trace!(room, "pruned empty room");
        }

        removed
    }

    /// Check if a connection is a member of a room.
    #[must_use]
    pub fn is_member(&self, room: &str, connection_id: &ConnectionId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|r| r.contains(connection_id))
    }

    /// Get the member count of a room.
    #[must_use]
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, |r| r.member_count())
    }

    /// Get the members of a room.
    #[must_use]
    pub fn members_of(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|r| r.members().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live chat rooms (pseudo-rooms excluded).
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms
            .iter()
            .filter(|e| !e.key().starts_with('$'))
            .count()
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.mailboxes.len()
    }

    /// Deliver an event directly to one connection.
    ///
    /// Returns `true` if the event was accepted by the mailbox.
    pub fn send_to(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        let Some(mailbox) = self.mailboxes.get(connection_id) else {
            trace!(connection = %connection_id, "send to unregistered connection");
            return false;
        };
        self.deliver(connection_id, &mailbox, Arc::new(event))
    }

    /// Broadcast an event to a room's members, best-effort per recipient.
    ///
    /// Returns the number of mailboxes that accepted the event.
    pub fn broadcast(
        &self,
        room: &str,
        event: ServerEvent,
        exclude: Option<&ConnectionId>,
    ) -> usize {
        let Some(entry) = self.rooms.get(room) else {
            trace!(room, "broadcast to non-existent room");
            return 0;
        };
        // Collect targets and release the room shard before touching the
        // mailbox map, so no two shard locks are ever held at once.
        let targets: Vec<ConnectionId> = entry
            .members()
            .filter(|c| exclude != Some(*c))
            .cloned()
            .collect();
        drop(entry);

        let event = Arc::new(event);
        let mut delivered = 0;
        for connection_id in &targets {
            if let Some(mailbox) = self.mailboxes.get(connection_id) {
                if self.deliver(connection_id, &mailbox, Arc::clone(&event)) {
                    delivered += 1;
                }
            }
        }

        trace!(room, recipients = delivered, "broadcast");
        delivered
    }

    /// Broadcast an event to every registered connection.
    ///
    /// Returns the number of mailboxes that accepted the event.
    pub fn broadcast_all(&self, event: ServerEvent, exclude: Option<&ConnectionId>) -> usize {
        self.broadcast(GLOBAL_ROOM, event, exclude)
    }

    fn deliver(
        &self,
        connection_id: &ConnectionId,
        mailbox: &Mailbox,
        event: Arc<ServerEvent>,
    ) -> bool {
        match mailbox.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    connection = %connection_id,
                    event = event.event_type(),
                    "mailbox full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                trace!(connection = %connection_id, "mailbox closed");
                false
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn register(
        registry: &RoomRegistry,
        id: &str,
        capacity: usize,
    ) -> mpsc::Receiver<Arc<ServerEvent>> {
        let (tx, rx) = mpsc::channel(capacity);
        registry.register(conn(id), tx);
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Arc<ServerEvent>>) -> Vec<Arc<ServerEvent>> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_join_leave_membership() {
        let registry = RoomRegistry::new();
        let _rx = register(&registry, "conn-1", 8);

        assert_eq!(registry.join("room-1", conn("conn-1")).unwrap(), 1);
        assert!(registry.is_member("room-1", &conn("conn-1")));

        // Idempotent join
        assert_eq!(registry.join("room-1", conn("conn-1")).unwrap(), 1);

        assert!(registry.leave("room-1", &conn("conn-1")));
        assert!(!registry.is_member("room-1", &conn("conn-1")));

        // Leaving a non-member / non-existent room is a no-op
        assert!(!registry.leave("room-1", &conn("conn-1")));
        assert!(!registry.leave("nowhere", &conn("conn-1")));
    }

    #[test]
    fn test_empty_rooms_are_pruned() {
        let registry = RoomRegistry::new();
        let _rx = register(&registry, "conn-1", 8);

        registry.join("room-1", conn("conn-1")).unwrap();
        assert_eq!(registry.room_count(), 1);

        registry.leave("room-1", &conn("conn-1"));
        assert_eq!(registry.room_count(), 0);

        // Join after prune recreates the room
        assert_eq!(registry.join("room-1", conn("conn-1")).unwrap(), 1);
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_invalid_room_names_rejected() {
        let registry = RoomRegistry::new();

        assert!(registry.join("", conn("conn-1")).is_err());
        assert!(registry.join("$connections", conn("conn-1")).is_err());
    }

    #[test]
    fn test_broadcast_excludes_sender() {
        let registry = RoomRegistry::new();
        let mut rx1 = register(&registry, "conn-1", 8);
        let mut rx2 = register(&registry, "conn-2", 8);

        registry.join("room-1", conn("conn-1")).unwrap();
        registry.join("room-1", conn("conn-2")).unwrap();

        let delivered = registry.broadcast(
            "room-1",
            ServerEvent::user_typing("u1", None, "room-1"),
            Some(&conn("conn-1")),
        );

        assert_eq!(delivered, 1);
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2).len(), 1);
    }

    #[test]
    fn test_broadcast_all_uses_global_room() {
        let registry = RoomRegistry::new();
        let mut rx1 = register(&registry, "conn-1", 8);
        let mut rx2 = register(&registry, "conn-2", 8);
        let mut rx3 = register(&registry, "conn-3", 8);

        let delivered =
            registry.broadcast_all(ServerEvent::user_online("u1", "Alice"), Some(&conn("conn-1")));

        assert_eq!(delivered, 2);
        assert!(drain(&mut rx1).is_empty());
        assert_eq!(drain(&mut rx2).len(), 1);
        assert_eq!(drain(&mut rx3).len(), 1);
    }

    #[test]
    fn test_full_mailbox_drops_only_that_recipient() {
        let registry = RoomRegistry::new();
        let mut slow = register(&registry, "slow", 1);
        let mut fast = register(&registry, "fast", 8);

        registry.join("room-1", conn("slow")).unwrap();
        registry.join("room-1", conn("fast")).unwrap();

        for _ in 0..3 {
            registry.broadcast("room-1", ServerEvent::user_typing("u1", None, "room-1"), None);
        }

        // The slow mailbox kept its first event and dropped the rest;
        // the fast one saw everything.
        assert_eq!(drain(&mut slow).len(), 1);
        assert_eq!(drain(&mut fast).len(), 3);
    }

    #[test]
    fn test_deregister_removes_from_global_room() {
        let registry = RoomRegistry::new();
        let _rx1 = register(&registry, "conn-1", 8);
        let mut rx2 = register(&registry, "conn-2", 8);

        registry.deregister(&conn("conn-2"));
        assert_eq!(registry.connection_count(), 1);

        let delivered = registry.broadcast_all(ServerEvent::user_online("u1", "Alice"), None);
        assert_eq!(delivered, 1);
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn test_send_to_unregistered_connection() {
        let registry = RoomRegistry::new();
        assert!(!registry.send_to(&conn("ghost"), ServerEvent::user_online("u1", "Alice")));
    }
}
