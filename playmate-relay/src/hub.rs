//! Connection registry and room membership.
//!
//! The [`Hub`] owns the only shared mutable state in the relay: which
//! connections are live, and which rooms each of them has joined. Rooms are
//! not created or destroyed explicitly; a room exists while its member set is
//! non-empty and is dropped the moment the last member leaves or disconnects.
//!
//! Every operation takes the registry lock once and never awaits while
//! holding it, so a broadcast iterates a consistent snapshot of the room and
//! membership changes on a room are atomic with respect to each other.

use std::collections::{HashMap, HashSet};

use axum::extract::ws::{Message, Utf8Bytes};
use parking_lot::RwLock;
use playmate_proto::codec;
use playmate_proto::connection::ConnectionId;
use playmate_proto::event::ServerEvent;
use playmate_proto::room::RoomId;
use tokio::sync::mpsc;

/// Channel feeding one connection's WebSocket writer task.
pub type Outbox = mpsc::UnboundedSender<Message>;

/// Who receives a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Every member of the room. Used for server-initiated broadcasts and
    /// for events the originator should see confirmed.
    Everyone,
    /// Every member except the originating connection.
    ExceptSender(ConnectionId),
}

/// Decides whether a connection may join a room.
///
/// Consulted on every join. A refused join is dropped silently.
pub trait JoinPolicy: Send + Sync {
    /// Returns `true` if `connection` may become a member of `room`.
    fn may_join(&self, connection: ConnectionId, room: &RoomId) -> bool;
}

/// Lets any connection join any room.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl JoinPolicy for AllowAll {
    fn may_join(&self, _connection: ConnectionId, _room: &RoomId) -> bool {
        true
    }
}

impl<F> JoinPolicy for F
where
    F: Fn(ConnectionId, &RoomId) -> bool + Send + Sync,
{
    fn may_join(&self, connection: ConnectionId, room: &RoomId) -> bool {
        self(connection, room)
    }
}

struct Member {
    outbox: Outbox,
    rooms: HashSet<RoomId>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Member>,
    rooms: HashMap<RoomId, HashSet<ConnectionId>>,
}

impl Registry {
    /// Drops `connection` from `room`, removing the room once it is empty.
    fn remove_member(&mut self, room: &RoomId, connection: ConnectionId) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(&connection);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// Process-wide connection registry and room membership map.
pub struct Hub {
    registry: RwLock<Registry>,
    policy: Box<dyn JoinPolicy>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}

impl Hub {
    /// Creates an empty hub that lets any connection join any room.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(AllowAll)
    }

    /// Creates an empty hub that consults `policy` on every join.
    #[must_use]
    pub fn with_policy(policy: impl JoinPolicy + 'static) -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
            policy: Box::new(policy),
        }
    }

    /// Registers a new connection with an empty room set and returns its
    /// freshly generated identifier.
    pub fn connect(&self, outbox: Outbox) -> ConnectionId {
        let id = ConnectionId::new();
        self.registry.write().connections.insert(
            id,
            Member {
                outbox,
                rooms: HashSet::new(),
            },
        );
        tracing::debug!(connection_id = %id, "connection registered");
        id
    }

    /// Adds `connection` to `room`.
    ///
    /// Returns `true` if membership changed. Joining a room twice, joining
    /// from a connection that is no longer registered, and joins refused by
    /// the [`JoinPolicy`] all return `false` and change nothing.
    pub fn join(&self, connection: ConnectionId, room: &RoomId) -> bool {
        if !self.policy.may_join(connection, room) {
            tracing::warn!(connection_id = %connection, room = %room, "join refused by policy");
            return false;
        }

        let mut registry = self.registry.write();
        let Some(member) = registry.connections.get_mut(&connection) else {
            return false;
        };
        if !member.rooms.insert(room.clone()) {
            return false;
        }
        registry
            .rooms
            .entry(room.clone())
            .or_default()
            .insert(connection);
        true
    }

    /// Removes `connection` from `room`.
    ///
    /// Returns `true` if membership changed; leaving a room the connection
    /// is not in is a no-op.
    pub fn leave(&self, connection: ConnectionId, room: &RoomId) -> bool {
        let mut registry = self.registry.write();
        let removed = registry
            .connections
            .get_mut(&connection)
            .is_some_and(|member| member.rooms.remove(room));
        if removed {
            registry.remove_member(room, connection);
        }
        removed
    }

    /// Unregisters `connection` and removes it from every room it joined.
    ///
    /// Returns the rooms it was a member of, or `None` if it was not
    /// registered.
    pub fn disconnect(&self, connection: ConnectionId) -> Option<Vec<RoomId>> {
        let mut registry = self.registry.write();
        let member = registry.connections.remove(&connection)?;
        for room in &member.rooms {
            registry.remove_member(room, connection);
        }
        drop(registry);

        tracing::debug!(
            connection_id = %connection,
            rooms = member.rooms.len(),
            "connection unregistered"
        );
        Some(member.rooms.into_iter().collect())
    }

    /// Delivers `event` to the current members of `room`.
    ///
    /// The event is encoded once and the same frame is handed to every
    /// recipient. Returns the number of connections it was handed to; a room
    /// with no members yields `0`.
    pub fn broadcast(&self, room: &RoomId, event: &ServerEvent, delivery: Delivery) -> usize {
        let Some(frame) = encode_frame(event) else {
            return 0;
        };

        let registry = self.registry.read();
        let Some(members) = registry.rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for id in members {
            if delivery == Delivery::ExceptSender(*id) {
                continue;
            }
            if let Some(member) = registry.connections.get(id)
                && member.outbox.send(Message::Text(frame.clone())).is_ok()
            {
                delivered += 1;
            }
        }
        drop(registry);

        tracing::trace!(room = %room, event = event.name(), delivered, "broadcast");
        delivered
    }

    /// Sends `event` to a single connection. Returns `false` if the
    /// connection is not registered or its writer has gone away.
    pub fn send_to(&self, connection: ConnectionId, event: &ServerEvent) -> bool {
        let Some(frame) = encode_frame(event) else {
            return false;
        };
        self.registry
            .read()
            .connections
            .get(&connection)
            .is_some_and(|member| member.outbox.send(Message::Text(frame)).is_ok())
    }

    /// Sends a WebSocket close frame to every registered connection.
    pub fn close_all(&self) {
        let registry = self.registry.read();
        for (id, member) in &registry.connections {
            tracing::info!(connection_id = %id, "sending close frame");
            let _ = member.outbox.send(Message::Close(None));
        }
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry.read().connections.len()
    }

    /// Number of rooms with at least one member.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.registry.read().rooms.len()
    }

    /// Whether `connection` is registered.
    #[must_use]
    pub fn is_connected(&self, connection: ConnectionId) -> bool {
        self.registry.read().connections.contains_key(&connection)
    }

    /// Current members of `room`, sorted by connect time.
    #[must_use]
    pub fn room_members(&self, room: &RoomId) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self
            .registry
            .read()
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort_unstable();
        members
    }

    /// Rooms `connection` has joined, sorted by name.
    #[must_use]
    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .registry
            .read()
            .connections
            .get(&connection)
            .map(|m| m.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort_unstable();
        rooms
    }
}

fn encode_frame(event: &ServerEvent) -> Option<Utf8Bytes> {
    match codec::encode(event) {
        Ok(text) => Some(Utf8Bytes::from(text)),
        Err(e) => {
            tracing::error!(event = event.name(), error = %e, "failed to encode event");
            None
        }
    }
}
