//! Handles to the running actors, shared by the accept loop and the HTTP
//! layer.

use parley_chat::{ChatBroadcaster, ChatConfig, ChatHandle};
use parley_session::{SessionConfig, SessionStore, SessionStoreHandle};
use parley_transport::{Connection, WebSocketConnection};

/// Everything a request handler or connection task needs to reach the
/// service's state.
///
/// Built once at startup. Cloning is cheap: both fields are channel
/// handles.
pub struct ServiceContext<C: Connection = WebSocketConnection> {
    /// The chat broadcaster.
    pub chat: ChatHandle<C>,
    /// The session store.
    pub sessions: SessionStoreHandle,
}

impl<C: Connection> ServiceContext<C> {
    /// Wraps existing actor handles.
    pub fn new(chat: ChatHandle<C>, sessions: SessionStoreHandle) -> Self {
        Self { chat, sessions }
    }

    /// Spawns both actors with the given configs.
    pub fn spawn(chat_config: ChatConfig, session_config: SessionConfig) -> Self {
        Self {
            chat: ChatBroadcaster::spawn(chat_config),
            sessions: SessionStore::spawn(session_config),
        }
    }

    /// Asks both actors to stop. Actors that are already gone are ignored.
    pub async fn shutdown(&self) {
        let _ = self.chat.shutdown().await;
        let _ = self.sessions.shutdown().await;
    }
}

impl<C: Connection> Clone for ServiceContext<C> {
    fn clone(&self) -> Self {
        Self {
            chat: self.chat.clone(),
            sessions: self.sessions.clone(),
        }
    }
}
