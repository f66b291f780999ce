//! Per-connection handler: registration, message routing, and liveness.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register the connection with the registry (alive, in no room)
//!   2. Loop: inbound frames → room operations; outbound commands → socket
//!   3. On close, error, termination or shutdown → disconnect cascade
//!
//! Termination is watched alongside every socket write, so a peer that
//! stops reading cannot hold its connection open by stalling a send.

use std::sync::Arc;

use roomcast_protocol::{ClientMessage, Codec};
use roomcast_room::{Outbound, PeerReceiver, peer_channel};
use roomcast_transport::{Connection, ConnectionId, Frame, WebSocketConnection};

use crate::RelayError;
use crate::server::{ServerState, shutdown_requested};

/// Drop guard that disconnects the connection when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct DisconnectGuard<C: Codec> {
    conn_id: ConnectionId,
    state: Arc<ServerState<C>>,
}

impl<C: Codec> Drop for DisconnectGuard<C> {
    fn drop(&mut self) {
        let conn_id = self.conn_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.registry.lock().await.disconnect(conn_id);
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), RelayError> {
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (tx, rx) = peer_channel();
    if !state.registry.lock().await.connect(conn_id, tx) {
        return Ok(());
    }
    let _guard = DisconnectGuard {
        conn_id,
        state: Arc::clone(&state),
    };

    let PeerReceiver {
        mut outbound,
        mut termination,
    } = rx;
    let mut shutdown = state.shutdown.subscribe();

    loop {
        tokio::select! {
            biased;
            _ = termination.fired() => {
                tracing::info!(%conn_id, "terminating connection");
                return Ok(());
            }
            frame = conn.recv() => match frame {
                Ok(Some(Frame::Data(data))) => {
                    handle_payload(&state, conn_id, &data).await;
                }
                Ok(Some(Frame::Pong)) => {
                    state.registry.lock().await.acknowledge(conn_id);
                }
                Ok(None) => {
                    tracing::debug!(%conn_id, "connection closed by peer");
                    break;
                }
                Err(e) => {
                    tracing::warn!(%conn_id, error = %e, "connection error");
                    break;
                }
            },
            Some(out) = outbound.recv() => {
                // A peer that stopped reading stalls the write; termination
                // must still get through.
                let delivered = tokio::select! {
                    biased;
                    _ = termination.fired() => false,
                    () = deliver(&conn, &state.codec, out) => true,
                };
                if !delivered {
                    tracing::info!(%conn_id, "terminating connection during a stalled write");
                    return Ok(());
                }
            }
            _ = shutdown_requested(&mut shutdown) => {
                if let Err(e) = conn.close().await {
                    tracing::debug!(%conn_id, error = %e, "close failed");
                }
                break;
            }
        }
    }

    // _guard drops here → registry disconnect fires.
    Ok(())
}

/// Writes one queued command to the socket. Failures are logged; delivery
/// is best effort.
async fn deliver<C: Codec>(conn: &WebSocketConnection, codec: &C, out: Outbound) {
    let conn_id = conn.id();
    match out {
        Outbound::Message(msg) => match codec.encode(&msg) {
            Ok(text) => {
                if let Err(e) = conn.send(text).await {
                    tracing::debug!(%conn_id, error = %e, "send failed");
                }
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode message");
            }
        },
        Outbound::Probe => {
            if let Err(e) = conn.ping().await {
                tracing::debug!(%conn_id, error = %e, "probe failed");
            }
        }
    }
}

/// Decodes one inbound payload and applies it to the registry.
///
/// Malformed payloads and unknown message types are logged and dropped;
/// neither ends the connection.
async fn handle_payload<C: Codec>(
    state: &ServerState<C>,
    conn_id: ConnectionId,
    data: &[u8],
) {
    let msg: ClientMessage = match state.codec.decode(data) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::warn!(%conn_id, error = %e, "discarding malformed payload");
            return;
        }
    };
    tracing::debug!(%conn_id, kind = msg.kind(), "received message");

    let mut registry = state.registry.lock().await;
    let result = match msg {
        ClientMessage::Create { room } => registry.create(conn_id, room),
        ClientMessage::Join { room } => registry.join(conn_id, room),
        ClientMessage::Transcript { text } => {
            registry.broadcast(conn_id, &text).map(|_| ())
        }
        ClientMessage::Unrecognized => {
            tracing::debug!(%conn_id, "ignoring unrecognized message type");
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::debug!(%conn_id, error = %e, "message had no effect");
    }
}
