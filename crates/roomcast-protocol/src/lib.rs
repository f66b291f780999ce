//! Wire protocol for Roomcast.
//!
//! This crate defines the "language" that clients and the relay speak:
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`RoomId`]): the
//!   message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to and from text.
//! - **Errors** ([`ProtocolError`]): what can go wrong while doing so.
//!
//! # Wire format
//!
//! | direction | `type`       | fields         |
//! |-----------|--------------|----------------|
//! | in        | `create`     | `room: string` |
//! | in        | `join`       | `room: string` |
//! | in        | `transcript` | `text: string` |
//! | out       | `connected`  |                |
//! | out       | `transcript` | `text: string` |
//!
//! The protocol layer doesn't know about connections or rooms; it only
//! knows how to serialize and deserialize messages.

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{ClientMessage, RoomId, ServerMessage};
