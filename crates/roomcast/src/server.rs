//! `RelayServer` builder, accept loop, and liveness loop.
//!
//! This is the entry point for running a relay. It ties together all the
//! layers: transport → protocol → room registry, with the liveness monitor
//! running beside the accept loop.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use roomcast_liveness::{LivenessConfig, LivenessMonitor};
use roomcast_protocol::{Codec, JsonCodec, RoomId};
use roomcast_room::Registry;
use roomcast_transport::{Transport, WebSocketTransport};
use tokio::sync::{Mutex, watch};

use crate::handler::handle_connection;
use crate::{RelayError, ServerConfig};

/// Shared server state passed to each connection handler task.
///
/// The registry sits behind a single async mutex: every room operation and
/// every liveness sweep takes it, so they never interleave.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) codec: C,
    /// Flips to `true` once; every loop in the server watches it.
    pub(crate) shutdown: watch::Sender<bool>,
}

/// Builder for configuring and starting a relay server.
///
/// # Example
///
/// ```rust,no_run
/// use roomcast::prelude::*;
///
/// # async fn start() -> Result<(), RelayError> {
/// let server = RelayServerBuilder::new()
///     .bind("0.0.0.0:3001")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RelayServerBuilder {
    bind_addr: String,
    liveness: LivenessConfig,
}

impl RelayServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::from_config(ServerConfig::default())
    }

    /// Creates a builder from a loaded [`ServerConfig`].
    pub fn from_config(config: ServerConfig) -> Self {
        Self {
            bind_addr: config.bind_addr(),
            liveness: config.liveness,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the liveness monitor configuration.
    pub fn liveness(mut self, config: LivenessConfig) -> Self {
        self.liveness = config;
        self
    }

    /// Shorthand for a liveness config with the given sweep interval.
    pub fn liveness_interval(self, interval: Duration) -> Self {
        self.liveness(LivenessConfig::with_interval(interval))
    }

    /// Binds the transport and builds a server speaking JSON.
    pub async fn build(self) -> Result<RelayServer<JsonCodec>, RelayError> {
        self.build_with_codec(JsonCodec).await
    }

    /// Binds the transport and builds a server using `codec`.
    pub async fn build_with_codec<C: Codec>(
        self,
        codec: C,
    ) -> Result<RelayServer<C>, RelayError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let (shutdown, _) = watch::channel(false);

        let state = Arc::new(ServerState {
            registry: Mutex::new(Registry::new()),
            codec,
            shutdown,
        });

        Ok(RelayServer {
            transport,
            state,
            liveness: self.liveness,
        })
    }
}

impl Default for RelayServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound relay server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct RelayServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
    liveness: LivenessConfig,
}

impl<C: Codec> RelayServer<C> {
    /// Creates a new builder.
    pub fn builder() -> RelayServerBuilder {
        RelayServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.transport.local_addr()?)
    }

    /// Returns a handle for inspecting and stopping the server.
    pub fn handle(&self) -> RelayHandle<C> {
        RelayHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Runs until [`RelayHandle::shutdown`] is called.
    pub async fn run(self) -> Result<(), RelayError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop and the liveness monitor until `signal`
    /// resolves or [`RelayHandle::shutdown`] is called.
    ///
    /// On shutdown the liveness timer is cancelled first, then open
    /// connections are closed and the transport stops accepting.
    pub async fn run_until(
        mut self,
        signal: impl Future<Output = ()>,
    ) -> Result<(), RelayError> {
        let addr = self.transport.local_addr()?;
        tracing::info!(%addr, "roomcast relay running");

        let monitor = tokio::spawn(run_liveness(
            Arc::clone(&self.state),
            LivenessMonitor::new(self.liveness.clone()),
            self.state.shutdown.subscribe(),
        ));

        let mut shutdown = self.state.shutdown.subscribe();
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    tracing::info!("shutdown signal received");
                    break;
                }
                _ = shutdown_requested(&mut shutdown) => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(conn, state).await {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        self.state.shutdown.send_replace(true);
        if monitor.await.is_err() {
            tracing::error!("liveness monitor task panicked");
        }
        self.transport.shutdown().await?;
        tracing::info!("roomcast relay stopped");
        Ok(())
    }
}

/// Resolves once the shutdown flag is set (or its sender is gone).
pub(crate) async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Sweeps the registry on every liveness tick until shutdown.
async fn run_liveness<C: Codec>(
    state: Arc<ServerState<C>>,
    mut monitor: LivenessMonitor,
    mut shutdown: watch::Receiver<bool>,
) {
    if monitor.is_disabled() {
        tracing::info!("liveness sweeps disabled");
    }

    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            tick = monitor.wait_for_sweep() => {
                let report = state.registry.lock().await.sweep();
                monitor.record_sweep(report.probed, report.terminated.len());
                tracing::trace!(
                    sweep = tick.sweep,
                    probed = report.probed,
                    terminated = report.terminated.len(),
                    "liveness sweep done"
                );
            }
        }
    }

    let metrics = monitor.metrics();
    tracing::debug!(
        sweeps = metrics.total_sweeps,
        terminations = metrics.total_terminations,
        "liveness monitor stopped"
    );
}

/// A cloneable handle to a running server.
pub struct RelayHandle<C: Codec = JsonCodec> {
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Clone for RelayHandle<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: Codec> RelayHandle<C> {
    /// Number of rooms that currently have members.
    pub async fn room_count(&self) -> usize {
        self.state.registry.lock().await.room_count()
    }

    /// Names of all current rooms, sorted.
    pub async fn room_ids(&self) -> Vec<RoomId> {
        self.state.registry.lock().await.room_ids()
    }

    /// Member count of `room`; zero if it does not exist.
    pub async fn member_count(&self, room: &str) -> usize {
        self.state.registry.lock().await.member_count(room)
    }

    /// Number of open connections, in a room or not.
    pub async fn connection_count(&self) -> usize {
        self.state.registry.lock().await.connection_count()
    }

    /// Runs `f` against the registry while holding its lock.
    pub async fn inspect<R>(&self, f: impl FnOnce(&Registry) -> R) -> R {
        f(&*self.state.registry.lock().await)
    }

    /// Asks the server to stop. Safe to call more than once.
    pub fn shutdown(&self) {
        self.state.shutdown.send_replace(true);
    }

    /// Whether shutdown has been requested.
    pub fn is_shut_down(&self) -> bool {
        *self.state.shutdown.borrow()
    }
}
