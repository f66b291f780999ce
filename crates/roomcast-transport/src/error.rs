use std::net::SocketAddr;
use std::time::Duration;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection is already closed; nothing more can be sent on it.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding the listener or accepting a TCP stream failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade did not complete in time.
    #[error("handshake with {addr} timed out after {timeout:?}")]
    HandshakeTimeout {
        /// Remote address of the stalled client.
        addr: SocketAddr,
        /// The configured upgrade deadline.
        timeout: Duration,
    },

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
