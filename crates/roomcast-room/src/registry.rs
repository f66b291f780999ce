//! The registry: every room, every connection, and the operations that
//! move connections between them.
//!
//! The registry is plain synchronous state. Callers serialize access to it
//! (the server keeps it behind one async mutex), so each operation below is
//! atomic with respect to every other one, including liveness sweeps.

use std::collections::{HashMap, HashSet};

use roomcast_liveness::{Heartbeat, Verdict};
use roomcast_protocol::{RoomId, ServerMessage};
use roomcast_transport::ConnectionId;

use crate::{Outbound, PeerSender, Room, RoomError};

/// What the registry knows about one open connection.
#[derive(Debug)]
struct ConnectionEntry {
    sender: PeerSender,
    /// The room this connection most recently created or joined.
    current_room: Option<RoomId>,
    /// Every room whose member set contains this connection. Joining a
    /// second room does not leave the first, so this can exceed one.
    memberships: HashSet<RoomId>,
    heartbeat: Heartbeat,
}

/// Outcome of one liveness sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Connections that were sent a probe.
    pub probed: usize,
    /// Connections that were force-closed and removed.
    pub terminated: Vec<ConnectionId>,
}

/// The process-wide room membership table.
///
/// Invariant: a room is present if and only if its member set is non-empty.
#[derive(Debug, Default)]
pub struct Registry {
    rooms: HashMap<RoomId, Room>,
    connections: HashMap<ConnectionId, ConnectionEntry>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Connection lifecycle
    // -----------------------------------------------------------------

    /// Registers a freshly accepted connection. It starts alive and in no
    /// room.
    ///
    /// Returns `false` (and keeps the existing entry) if `conn` is already
    /// registered.
    pub fn connect(&mut self, conn: ConnectionId, sender: PeerSender) -> bool {
        if self.connections.contains_key(&conn) {
            tracing::warn!(%conn, "connection registered twice, ignoring");
            return false;
        }
        self.connections.insert(
            conn,
            ConnectionEntry {
                sender,
                current_room: None,
                memberships: HashSet::new(),
                heartbeat: Heartbeat::new(),
            },
        );
        tracing::info!(%conn, connections = self.connections.len(), "client connected");
        true
    }

    /// Forgets a connection after the transport closed it.
    ///
    /// Leaves the current room first, then any earlier room the connection
    /// is still a member of, deleting rooms it leaves empty. Idempotent:
    /// returns `false` if `conn` was unknown.
    pub fn disconnect(&mut self, conn: ConnectionId) -> bool {
        let left = self.leave(conn);
        let Some(entry) = self.connections.remove(&conn) else {
            return false;
        };
        for room_id in &entry.memberships {
            self.remove_member(room_id, conn);
        }
        tracing::info!(
            %conn,
            room = ?left.as_ref().map(RoomId::as_str),
            "client disconnected"
        );
        true
    }

    // -----------------------------------------------------------------
    // Room operations
    // -----------------------------------------------------------------

    /// Makes `room` the connection's current room, creating the room if it
    /// does not exist, and acknowledges with `connected`.
    ///
    /// Re-creating an existing room just joins it; creating twice from the
    /// same connection leaves a single membership.
    pub fn create(
        &mut self,
        conn: ConnectionId,
        room: RoomId,
    ) -> Result<(), RoomError> {
        let entry = self
            .connections
            .get_mut(&conn)
            .ok_or(RoomError::UnknownConnection(conn))?;

        let target = self.rooms.entry(room.clone()).or_insert_with(|| {
            tracing::info!(room = %room, "room created");
            Room::new(room.clone())
        });
        target.insert(conn);
        tracing::info!(
            %conn,
            room = %room,
            members = target.len(),
            "client entered room via create"
        );

        entry.memberships.insert(room.clone());
        entry.current_room = Some(room);
        entry.sender.send(Outbound::Message(ServerMessage::Connected));
        Ok(())
    }

    /// Joins an existing room and acknowledges with `connected`.
    ///
    /// Never creates a room. If `room` is unknown nothing changes, nothing
    /// is sent, and `RoomError::NotFound` is returned for the caller to log.
    pub fn join(
        &mut self,
        conn: ConnectionId,
        room: RoomId,
    ) -> Result<(), RoomError> {
        let entry = self
            .connections
            .get_mut(&conn)
            .ok_or(RoomError::UnknownConnection(conn))?;
        let Some(target) = self.rooms.get_mut(&room) else {
            return Err(RoomError::NotFound(room));
        };

        target.insert(conn);
        tracing::info!(
            %conn,
            room = %room,
            members = target.len(),
            "client joined room"
        );

        entry.memberships.insert(room.clone());
        entry.current_room = Some(room);
        entry.sender.send(Outbound::Message(ServerMessage::Connected));
        Ok(())
    }

    /// Relays `text` to every other member of the sender's current room.
    ///
    /// Members whose connection is no longer sendable are skipped. Returns
    /// how many members the transcript was handed to.
    pub fn broadcast(
        &self,
        conn: ConnectionId,
        text: &str,
    ) -> Result<usize, RoomError> {
        let entry = self
            .connections
            .get(&conn)
            .ok_or(RoomError::UnknownConnection(conn))?;
        let room_id = entry
            .current_room
            .as_ref()
            .ok_or(RoomError::NoCurrentRoom(conn))?;
        let room = self
            .rooms
            .get(room_id)
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))?;

        let msg = ServerMessage::Transcript {
            text: text.to_string(),
        };
        let delivered = room
            .others(conn)
            .filter_map(|member| self.connections.get(&member))
            .filter(|peer| peer.sender.send(Outbound::Message(msg.clone())))
            .count();

        tracing::debug!(
            %conn,
            room = %room_id,
            recipients = delivered,
            "broadcast transcript"
        );
        Ok(delivered)
    }

    /// Removes the connection from its current room, deleting the room if
    /// it becomes empty.
    ///
    /// Returns the room that was left. Idempotent: `None` when the
    /// connection is unknown or in no room.
    pub fn leave(&mut self, conn: ConnectionId) -> Option<RoomId> {
        let entry = self.connections.get_mut(&conn)?;
        let room_id = entry.current_room.take()?;
        entry.memberships.remove(&room_id);
        self.remove_member(&room_id, conn);
        Some(room_id)
    }

    // -----------------------------------------------------------------
    // Liveness
    // -----------------------------------------------------------------

    /// Records a liveness acknowledgment. Returns `false` for unknown
    /// connections.
    pub fn acknowledge(&mut self, conn: ConnectionId) -> bool {
        match self.connections.get_mut(&conn) {
            Some(entry) => {
                entry.heartbeat.acknowledge();
                true
            }
            None => false,
        }
    }

    /// Runs one liveness sweep over every registered connection, whether
    /// or not it is in a room.
    ///
    /// Connections that never answered the previous probe are told to
    /// terminate and are disconnected on the spot; the rest are probed.
    /// The transport's later close of a terminated connection finds no
    /// entry, so the leave cascade runs exactly once.
    pub fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();

        for (id, entry) in &mut self.connections {
            match entry.heartbeat.check() {
                Verdict::Probe => {
                    entry.sender.send(Outbound::Probe);
                    report.probed += 1;
                }
                Verdict::Terminate => report.terminated.push(*id),
            }
        }

        for id in &report.terminated {
            tracing::info!(conn = %id, "terminating inactive client");
            if let Some(entry) = self.connections.get(id) {
                entry.sender.terminate();
            }
            self.disconnect(*id);
        }

        report
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    /// Number of rooms (every one of them non-empty).
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Names of all rooms, sorted.
    pub fn room_ids(&self) -> Vec<RoomId> {
        let mut ids: Vec<RoomId> = self.rooms.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn contains_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    pub fn room(&self, room: &str) -> Option<&Room> {
        self.rooms.get(room)
    }

    /// Members of `room`, sorted; empty if the room does not exist.
    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        let mut members: Vec<ConnectionId> = self
            .rooms
            .get(room)
            .map(|r| r.members().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Member count of `room`; zero if the room does not exist.
    pub fn member_count(&self, room: &str) -> usize {
        self.rooms.get(room).map_or(0, Room::len)
    }

    pub fn current_room(&self, conn: ConnectionId) -> Option<&RoomId> {
        self.connections.get(&conn)?.current_room.as_ref()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_connected(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    /// The liveness flag of `conn`, or `None` if it is not registered.
    pub fn is_alive(&self, conn: ConnectionId) -> Option<bool> {
        self.connections
            .get(&conn)
            .map(|entry| entry.heartbeat.is_alive())
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    /// Drops `conn` from one room's member set, deleting the room when it
    /// empties.
    fn remove_member(&mut self, room_id: &RoomId, conn: ConnectionId) {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return;
        };
        if !room.remove(conn) {
            return;
        }
        tracing::info!(
            %conn,
            room = %room_id,
            members = room.len(),
            "client left room"
        );
        if room.is_empty() {
            self.rooms.remove(room_id);
            tracing::info!(room = %room_id, "room deleted");
        }
    }
}
