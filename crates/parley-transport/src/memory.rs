//! In-process duplex connection built on Tokio channels.
//!
//! [`MemoryConnection::pair`] returns the server-side [`Connection`] and the
//! [`MemoryPeer`] that plays the remote client. Dropping the peer behaves
//! like the client going away: server reads yield `Ok(None)` and server
//! writes fail.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, Mutex};

use crate::{Connection, ConnectionId, Frame, TransportError};

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

/// Server side of an in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    outbound: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    inbound: Mutex<mpsc::UnboundedReceiver<Frame>>,
}

impl MemoryConnection {
    /// Creates a connected `(server, peer)` pair.
    pub fn pair() -> (MemoryConnection, MemoryPeer) {
        let id = ConnectionId::new(NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed));
        let (to_peer, from_server) = mpsc::unbounded_channel();
        let (to_server, from_peer) = mpsc::unbounded_channel();

        let conn = MemoryConnection {
            id,
            outbound: Mutex::new(Some(to_peer)),
            inbound: Mutex::new(from_peer),
        };
        let peer = MemoryPeer {
            id,
            to_server: Some(to_server),
            from_server: Some(from_server),
        };
        (conn, peer)
    }

    async fn push(&self, frame: Frame) -> Result<(), TransportError> {
        let outbound = self.outbound.lock().await;
        let sender = outbound.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed(format!("{} closed locally", self.id))
        })?;
        sender.send(frame).map_err(|_| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer stopped reading",
            ))
        })
    }
}

impl Connection for MemoryConnection {
    type Error = TransportError;

    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.push(Frame::Text(text.to_owned())).await
    }

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.push(Frame::Binary(data.to_vec())).await
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.outbound.lock().await.take();
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Remote end of a [`MemoryConnection`], driven by tests or embedders.
pub struct MemoryPeer {
    id: ConnectionId,
    to_server: Option<mpsc::UnboundedSender<Frame>>,
    from_server: Option<mpsc::UnboundedReceiver<Frame>>,
}

impl MemoryPeer {
    /// The id shared with the server-side connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Sends a text frame to the server.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), TransportError> {
        self.push(Frame::Text(text.into()))
    }

    /// Sends a binary frame to the server.
    pub fn send_binary(&self, data: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        self.push(Frame::Binary(data.into()))
    }

    /// Waits for the next frame from the server.
    ///
    /// Returns `None` once the server closed or dropped its side, or
    /// after [`close_read`](Self::close_read).
    pub async fn recv(&mut self) -> Option<Frame> {
        match self.from_server.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Returns a frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Frame> {
        self.from_server.as_mut()?.try_recv().ok()
    }

    /// Stops writing. The server's next `recv` returns `Ok(None)`.
    pub fn close(&mut self) {
        self.to_server.take();
    }

    /// Stops reading. The server's next send fails.
    pub fn close_read(&mut self) {
        self.from_server.take();
    }

    fn push(&self, frame: Frame) -> Result<(), TransportError> {
        let sender = self.to_server.as_ref().ok_or_else(|| {
            TransportError::ConnectionClosed(format!("{} closed by peer", self.id))
        })?;
        sender
            .send(frame)
            .map_err(|_| TransportError::ConnectionClosed(format!("{} dropped", self.id)))
    }
}
