//! `ParleyServer` builder and server loop.
//!
//! This is the entry point for running Parley. It binds both listeners,
//! spawns the chat broadcaster and the session store, and then drives two
//! loops side by side:
//!
//! - the WebSocket accept loop, registering each connection for chat
//! - the axum HTTP server for the token API

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use parley_chat::ChatConfig;
use parley_session::SessionConfig;
use parley_transport::{Transport, TransportError, WebSocketTransport, DEFAULT_HANDSHAKE_TIMEOUT};
use tokio::net::TcpListener;

use crate::{http, ParleyError, ServiceContext};

/// Builder for configuring and starting a Parley server.
///
/// # Example
///
/// ```rust,ignore
/// use parley::prelude::*;
///
/// let server = ParleyServer::builder()
///     .chat_addr("0.0.0.0:8000")
///     .http_addr("0.0.0.0:8080")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct ParleyServerBuilder {
    chat_addr: String,
    http_addr: String,
    handshake_timeout: Duration,
    chat_config: ChatConfig,
    session_config: SessionConfig,
}

impl ParleyServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            chat_addr: "127.0.0.1:8000".to_string(),
            http_addr: "127.0.0.1:8080".to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            chat_config: ChatConfig::default(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address of the WebSocket chat listener.
    pub fn chat_addr(mut self, addr: &str) -> Self {
        self.chat_addr = addr.to_string();
        self
    }

    /// Sets the address of the HTTP token API.
    pub fn http_addr(mut self, addr: &str) -> Self {
        self.http_addr = addr.to_string();
        self
    }

    /// Sets how long a chat client may take to complete the WebSocket
    /// upgrade before its socket is dropped.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Sets the chat broadcaster configuration.
    pub fn chat_config(mut self, config: ChatConfig) -> Self {
        self.chat_config = config;
        self
    }

    /// Sets the session store configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds both listeners and spawns the actors.
    ///
    /// The server does not accept connections until [`ParleyServer::run`].
    pub async fn build(self) -> Result<ParleyServer, ParleyError> {
        let transport =
            WebSocketTransport::bind_with_timeout(&self.chat_addr, self.handshake_timeout).await?;
        let http_listener = TcpListener::bind(&self.http_addr).await?;
        tracing::info!(addr = %self.http_addr, "HTTP token API listening");

        let ctx = ServiceContext::spawn(self.chat_config, self.session_config);

        Ok(ParleyServer {
            transport,
            http_listener,
            ctx,
        })
    }
}

impl Default for ParleyServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parley server.
///
/// Call [`run()`](Self::run) to start serving.
pub struct ParleyServer {
    transport: WebSocketTransport,
    http_listener: TcpListener,
    ctx: ServiceContext,
}

impl ParleyServer {
    /// Creates a new builder.
    pub fn builder() -> ParleyServerBuilder {
        ParleyServerBuilder::new()
    }

    /// The address of the WebSocket chat listener.
    pub fn chat_addr(&self) -> Result<SocketAddr, ParleyError> {
        Ok(self.transport.local_addr()?)
    }

    /// The address of the HTTP token API.
    pub fn http_addr(&self) -> Result<SocketAddr, ParleyError> {
        Ok(self.http_listener.local_addr()?)
    }

    /// Handles to the running actors.
    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    /// Serves until either loop fails. Runs until the process is
    /// terminated.
    pub async fn run(self) -> Result<(), ParleyError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then stops both actors.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), ParleyError> {
        tracing::info!("Parley server running");

        let app = http::router(self.ctx.clone());
        let ctx = self.ctx.clone();
        let http_listener = self.http_listener;

        let result = tokio::select! {
            res = async { axum::serve(http_listener, app).await } => {
                res.map_err(ParleyError::from)
            }
            res = accept_loop(&mut self.transport, &ctx) => res,
            _ = shutdown => {
                tracing::info!("shutdown requested");
                Ok(())
            }
        };

        let _ = self.transport.shutdown().await;
        self.ctx.shutdown().await;
        tracing::info!("Parley server stopped");
        result
    }
}

/// Accepts WebSocket connections and hands each one to the broadcaster.
///
/// Handshakes run inside the transport, so a slow or silent peer never
/// holds up this loop. The loop ends when the transport shuts down or the
/// broadcaster is gone.
async fn accept_loop(
    transport: &mut WebSocketTransport,
    ctx: &ServiceContext,
) -> Result<(), ParleyError> {
    loop {
        match transport.accept().await {
            Ok(conn) => {
                ctx.chat.register(conn).await?;
            }
            Err(TransportError::Shutdown) => return Ok(()),
            Err(e) => {
                tracing::warn!(error = %e, "accept failed");
            }
        }
    }
}
