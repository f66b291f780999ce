//! # Roomcast
//!
//! A room-scoped WebSocket relay for live transcripts.
//!
//! Clients open a connection, `create` or `join` a named room, and every
//! `transcript` they send is relayed to the other members of that room.
//! Rooms live only in memory and vanish as soon as their last member
//! leaves. A periodic liveness sweep probes every connection and drops the
//! ones that stopped answering.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use roomcast::prelude::*;
//!
//! # async fn start() -> Result<(), RelayError> {
//! roomcast::init_tracing();
//!
//! let config = ServerConfig::from_env()?;
//! let server = RelayServerBuilder::from_config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ENV_HOST, ENV_PING_INTERVAL, ENV_PORT, ServerConfig};
pub use error::RelayError;
pub use server::{RelayHandle, RelayServer, RelayServerBuilder};

/// Installs a `fmt` tracing subscriber filtered by `RUST_LOG`, defaulting
/// to `info`.
///
/// Subsequent calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

/// Everything needed to run and talk to a relay.
pub mod prelude {
    pub use crate::{
        RelayError, RelayHandle, RelayServer, RelayServerBuilder, ServerConfig,
    };
    pub use roomcast_liveness::LivenessConfig;
    pub use roomcast_protocol::{
        ClientMessage, Codec, JsonCodec, RoomId, ServerMessage,
    };
    pub use roomcast_room::{Registry, SweepReport};
    pub use roomcast_transport::ConnectionId;
}
