//! # Parley
//!
//! Chat relay and session broker for web games.
//!
//! Parley runs two services side by side:
//!
//! - a WebSocket chat relay: every text frame a client sends is appended to
//!   a bounded message log and relayed to all connected clients on the next
//!   delivery tick
//! - an HTTP token API: clients obtain a session token, describe it, and
//!   patch it with who they are and which game they are in
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parley::prelude::*;
//!
//! # async fn run() -> Result<(), ParleyError> {
//! let server = ParleyServer::builder()
//!     .chat_addr("0.0.0.0:8000")
//!     .http_addr("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod context;
mod error;
pub mod http;
mod server;

pub use context::ServiceContext;
pub use error::ParleyError;
pub use server::{ParleyServer, ParleyServerBuilder};

/// Convenience re-exports for working with Parley.
pub mod prelude {
    pub use crate::{ParleyError, ParleyServer, ParleyServerBuilder, ServiceContext};

    pub use parley_chat::{ChatBroadcaster, ChatConfig, ChatError, ChatHandle, ChatStats};
    pub use parley_session::{
        Session, SessionConfig, SessionError, SessionPatch, SessionStore, SessionStoreHandle,
        SessionView,
    };
    pub use parley_tick::TickConfig;
    pub use parley_transport::{Connection, Frame, MemoryConnection, MemoryPeer};
}
