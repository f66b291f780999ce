//! Room membership and broadcast engine for Roomcast.
//!
//! The [`Registry`] owns the mapping from room name to member set and the
//! table of open connections. Connections are referenced by
//! [`ConnectionId`](roomcast_transport::ConnectionId); the registry talks
//! back to them only through their [`PeerSender`] channel.
//!
//! # Key types
//!
//! - [`Registry`]: create / join / broadcast / leave, plus liveness sweeps
//! - [`Room`]: a named member set
//! - [`PeerSender`]: queued send and probe commands, plus out-of-band
//!   termination
//! - [`RoomError`]: why an operation was a no-op

mod error;
mod peer;
mod registry;
mod room;

pub use error::RoomError;
pub use peer::{Outbound, PeerReceiver, PeerSender, Termination, peer_channel};
pub use registry::{Registry, SweepReport};
pub use room::Room;
