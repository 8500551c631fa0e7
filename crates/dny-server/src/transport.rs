//! TCP transport.
//!
//! The devices speak cleartext TCP by firmware design, so the transport
//! is a thin wrapper over a tokio listener: bind, accept, hand the stream
//! to a connection task. Nagle is disabled - command/response latency
//! matters more than byte efficiency on these links.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};

use crate::error::ServerError;

/// Listening TCP transport.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind to the given address (e.g. `"0.0.0.0:7054"`).
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("TCP transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Accept one device connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))?;

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("set_nodelay failed for {}: {}", peer, e);
        }

        Ok((stream, peer))
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }
}
