//! Error types for the room layer.
//!
//! None of these reach the peer. The connection handler logs them and moves
//! on; a failed join or broadcast is simply a no-op.

use roomcast_protocol::RoomId;
use roomcast_transport::ConnectionId;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0:?} not found")]
    NotFound(RoomId),

    /// The connection has not created or joined any room.
    #[error("{0} is not in any room")]
    NoCurrentRoom(ConnectionId),

    /// The connection was never registered, or has already disconnected.
    #[error("{0} is not registered")]
    UnknownConnection(ConnectionId),
}
