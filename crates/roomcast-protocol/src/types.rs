//! Core protocol types for Roomcast's wire format.
//!
//! Every type here travels "on the wire": it is serialized to a JSON text
//! frame, sent over the connection, and parsed on the other side. The field
//! names and `type` discriminator values are fixed by deployed clients and
//! must not change.

use serde::{Deserialize, Serialize};

use std::borrow::Borrow;
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The name of a room.
///
/// Rooms are named by clients, so this wraps an arbitrary string: no format
/// constraints, case-sensitive, any length (the empty string included).
///
/// `#[serde(transparent)]` makes `RoomId("lobby")` serialize as just
/// `"lobby"` rather than `{ "0": "lobby" }`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a room ID from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the room name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RoomId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Lets a `HashMap<RoomId, _>` be queried with a plain `&str`.
impl Borrow<str> for RoomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// ClientMessage (inbound)
// ---------------------------------------------------------------------------

/// A message sent by a client to the relay.
///
/// `#[serde(tag = "type", rename_all = "lowercase")]` produces internally
/// tagged JSON with lowercase tags:
///   `{ "type": "create", "room": "lobby" }`
///
/// Any `type` value outside the known set decodes to
/// [`ClientMessage::Unrecognized`] instead of failing, so the handler can
/// match exhaustively. Payloads that are not JSON objects, have no `type`,
/// or are missing a variant's field still fail to decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Open the room (creating it if needed) and become a member.
    Create { room: RoomId },

    /// Become a member of a room that already exists.
    Join { room: RoomId },

    /// Relay `text` to every other member of the sender's current room.
    Transcript { text: String },

    /// A well-formed message whose `type` this server does not know.
    #[serde(other)]
    Unrecognized,
}

impl ClientMessage {
    /// The wire name of this message's `type`, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Join { .. } => "join",
            Self::Transcript { .. } => "transcript",
            Self::Unrecognized => "unrecognized",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage (outbound)
// ---------------------------------------------------------------------------

/// A message sent by the relay to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Acknowledges a successful create or join: `{ "type": "connected" }`.
    Connected,

    /// A payload broadcast by another member of the room.
    Transcript { text: String },
}

// =========================================================================
// Tests
// =========================================================================
