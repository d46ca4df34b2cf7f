//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! A listener task owns the TCP socket. Every accepted stream gets its own
//! handshake task bounded by a timeout, so a peer that connects and never
//! sends the upgrade request only ties up its own task. Finished
//! connections are queued for [`Transport::accept`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::{Connection, ConnectionId, Frame, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Handshakes that have not completed within this window are dropped.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Upgraded connections waiting for `accept()`.
const ACCEPT_BACKLOG: usize = 64;

type WsStream = tokio_tungstenite::WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    listener: JoinHandle<()>,
    shut_down: AtomicBool,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address using
    /// [`DEFAULT_HANDSHAKE_TIMEOUT`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_timeout(addr, DEFAULT_HANDSHAKE_TIMEOUT).await
    }

    /// Binds a new WebSocket transport, dropping any peer whose upgrade
    /// handshake takes longer than `handshake_timeout`.
    pub async fn bind_with_timeout(
        addr: &str,
        handshake_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, ?handshake_timeout, "WebSocket transport listening");

        let (tx, incoming) = mpsc::channel(ACCEPT_BACKLOG);
        let listener = tokio::spawn(listen(listener, tx, handshake_timeout));

        Ok(Self {
            local_addr,
            incoming,
            listener,
            shut_down: AtomicBool::new(false),
        })
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// Accepts TCP streams and spawns a bounded handshake for each.
async fn listen(
    listener: TcpListener,
    tx: mpsc::Sender<WebSocketConnection>,
    handshake_timeout: Duration,
) {
    loop {
        let (stream, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept failed");
                continue;
            }
        };
        let tx = tx.clone();
        tokio::spawn(async move {
            match tokio::time::timeout(handshake_timeout, handshake(stream, addr)).await {
                Ok(Ok(conn)) => {
                    // The receiver is gone once the transport shuts down.
                    let _ = tx.send(conn).await;
                }
                Ok(Err(e)) => tracing::debug!(%addr, error = %e, "WebSocket handshake failed"),
                Err(_) => tracing::debug!(%addr, "WebSocket handshake timed out"),
            }
        });
    }
}

async fn handshake(
    stream: TcpStream,
    addr: SocketAddr,
) -> Result<WebSocketConnection, tokio_tungstenite::tungstenite::Error> {
    let ws = tokio_tungstenite::accept_async(stream).await?;

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %addr, "accepted WebSocket connection");

    // Reads and writes happen from different tasks, so each half
    // gets its own lock.
    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    })
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    /// Returns the next upgraded connection.
    ///
    /// # Errors
    /// Returns [`TransportError::Shutdown`] once [`shutdown`](Self::shutdown)
    /// has been called or the listener task has stopped.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.incoming.recv().await.ok_or(TransportError::Shutdown)
    }

    fn local_addr(&self) -> Result<SocketAddr, Self::Error> {
        Ok(self.local_addr)
    }

    /// Stops the listener task and closes the listening socket.
    async fn shutdown(&self) -> Result<(), Self::Error> {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            self.listener.abort();
            tracing::info!(local_addr = %self.local_addr, "WebSocket transport shut down");
        }
        Ok(())
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl WebSocketConnection {
    async fn send_message(&self, msg: Message) -> Result<(), TransportError> {
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn send_text(&self, text: &str) -> Result<(), Self::Error> {
        self.send_message(Message::Text(text.to_owned().into())).await
    }

    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        self.send_message(Message::Binary(data.to_vec().into())).await
    }

    async fn recv(&self) -> Result<Option<Frame>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(Frame::Text(text.as_str().to_owned())));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(Frame::Binary(data.to_vec())));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
