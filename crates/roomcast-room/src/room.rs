//! A single room: a named set of member connections.

use std::collections::HashSet;

use roomcast_protocol::RoomId;
use roomcast_transport::ConnectionId;

/// A named group of connections that receive each other's broadcasts.
///
/// The registry only keeps rooms with at least one member; a `Room` on its
/// own can be empty while it is being built or torn down.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    members: HashSet<ConnectionId>,
}

impl Room {
    /// Creates an empty room.
    pub fn new(id: RoomId) -> Self {
        Self {
            id,
            members: HashSet::new(),
        }
    }

    /// The room's name.
    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Adds a member. Returns `false` if it was already present.
    pub fn insert(&mut self, conn: ConnectionId) -> bool {
        self.members.insert(conn)
    }

    /// Removes a member. Returns `false` if it was not present.
    pub fn remove(&mut self, conn: ConnectionId) -> bool {
        self.members.remove(&conn)
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.members.contains(&conn)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterates over members in unspecified order.
    pub fn members(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members.iter().copied()
    }

    /// Every member except `excluded`, the recipient set of a broadcast.
    pub fn others(
        &self,
        excluded: ConnectionId,
    ) -> impl Iterator<Item = ConnectionId> + '_ {
        self.members().filter(move |m| *m != excluded)
    }
}
