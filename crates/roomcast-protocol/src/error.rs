//! Error types for the protocol layer.
//!
//! Each crate in Roomcast defines its own error enum. A `ProtocolError`
//! always means the problem is in serialization, never in networking or
//! room membership.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into text).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, a non-object payload, a missing
    /// `type` tag or a missing field.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
