//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The relay speaks JSON text frames, so encoding produces a `String`
//! while decoding accepts raw bytes (text and binary frames both arrive as
//! bytes from the transport).

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to text and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text payload.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use roomcast_protocol::{ClientMessage, Codec, JsonCodec, RoomId, ServerMessage};
///
/// let codec = JsonCodec;
///
/// let msg: ClientMessage = codec.decode(br#"{"type":"join","room":"x"}"#).unwrap();
/// assert_eq!(msg, ClientMessage::Join { room: RoomId::new("x") });
///
/// let text = codec.encode(&ServerMessage::Connected).unwrap();
/// assert_eq!(text, r#"{"type":"connected"}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
