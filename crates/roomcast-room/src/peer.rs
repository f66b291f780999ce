//! The registry's view of a connection: a queue of outbound commands plus a
//! termination signal that bypasses the queue.

use roomcast_protocol::ServerMessage;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};

/// A queued command from the registry to a connection's I/O task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Deliver a message to the peer (best effort).
    Message(ServerMessage),
    /// Send a liveness probe.
    Probe,
}

/// Registry-side handle for one connection.
///
/// Queued commands reach the I/O task in order. Termination is out of band,
/// so it is observed even while the task is stuck writing an earlier
/// message to a peer that stopped reading.
#[derive(Debug)]
pub struct PeerSender {
    outbound: mpsc::UnboundedSender<Outbound>,
    terminate: watch::Sender<bool>,
}

impl PeerSender {
    /// Best-effort enqueue. Returns `false` if the connection is no longer
    /// sendable.
    pub fn send(&self, out: Outbound) -> bool {
        !self.outbound.is_closed() && self.outbound.send(out).is_ok()
    }

    /// A connection stops being sendable once its I/O task is gone.
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }

    /// Tells the I/O task to drop the connection without a close handshake.
    pub fn terminate(&self) {
        self.terminate.send_replace(true);
    }
}

/// I/O-task side of a connection's channel.
///
/// The two halves are public so a task can wait on both in one `select!`.
#[derive(Debug)]
pub struct PeerReceiver {
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    pub termination: Termination,
}

impl PeerReceiver {
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.outbound.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Outbound, TryRecvError> {
        self.outbound.try_recv()
    }
}

/// Fires once the registry condemns the connection.
#[derive(Debug)]
pub struct Termination(watch::Receiver<bool>);

impl Termination {
    pub fn is_fired(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves when termination has been requested.
    ///
    /// A sender dropped without firing (an ordinary disconnect) never
    /// resolves this.
    pub async fn fired(&mut self) {
        let fired = self.0.wait_for(|terminate| *terminate).await.is_ok();
        if !fired {
            std::future::pending::<()>().await;
        }
    }
}

/// Creates the channel pair for a newly accepted connection.
pub fn peer_channel() -> (PeerSender, PeerReceiver) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (terminate_tx, terminate_rx) = watch::channel(false);
    (
        PeerSender {
            outbound: outbound_tx,
            terminate: terminate_tx,
        },
        PeerReceiver {
            outbound: outbound_rx,
            termination: Termination(terminate_rx),
        },
    )
}
