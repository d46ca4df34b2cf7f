//! Session store actor: one Tokio task that owns the [`SessionRegistry`].
//!
//! Every request travels over a bounded command channel together with a
//! oneshot reply sender. A [`TickScheduler`] in the same `select!` loop
//! triggers the periodic expiry sweep, so requests and sweeps never race.

use parley_tick::TickScheduler;
use tokio::sync::{mpsc, oneshot};

use crate::{
    Clock, RandomTokens, Session, SessionConfig, SessionError, SessionPatch, SessionRegistry,
    SystemClock, TokenGenerator,
};

/// Commands sent to the store through its channel.
enum SessionCommand {
    /// Generate a token and create a blank session for it.
    RequestToken {
        reply: oneshot::Sender<Result<String, SessionError>>,
    },

    /// Look up a session by token.
    Find {
        token: String,
        reply: oneshot::Sender<Option<Session>>,
    },

    /// Apply a patch and renew the session's expiry.
    Patch {
        token: String,
        patch: SessionPatch,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Run an expiry sweep now. Replies with the number removed.
    Sweep { reply: oneshot::Sender<usize> },

    /// Report the number of stored sessions.
    Len { reply: oneshot::Sender<usize> },

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running session store. Cheap to clone.
///
/// When every handle has been dropped the actor shuts itself down.
#[derive(Clone)]
pub struct SessionStoreHandle {
    commands: mpsc::Sender<SessionCommand>,
}

impl SessionStoreHandle {
    /// Issues a new token backed by a blank session.
    ///
    /// # Errors
    /// [`SessionError::Collision`] if the generated token was already in
    /// use. Calling again draws a fresh token.
    pub async fn request_token(&self) -> Result<String, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::RequestToken { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Returns a copy of the session for `token`.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no such session.
    pub async fn find(&self, token: impl Into<String>) -> Result<Session, SessionError> {
        let token = token.into();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Find {
            token: token.clone(),
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable)?
            .ok_or(SessionError::NotFound(token))
    }

    /// Patches the session for `token`.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no such session.
    pub async fn patch(
        &self,
        token: impl Into<String>,
        patch: SessionPatch,
    ) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Patch {
            token: token.into(),
            patch,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Runs an expiry sweep immediately and returns how many sessions it
    /// removed.
    pub async fn sweep(&self) -> Result<usize, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Sweep { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)
    }

    /// Number of stored sessions, including expired ones not yet swept.
    pub async fn len(&self) -> Result<usize, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Len { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)
    }

    /// Tells the store to stop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown).await
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    async fn send(&self, cmd: SessionCommand) -> Result<(), SessionError> {
        self.commands
            .send(cmd)
            .await
            .map_err(|_| SessionError::Unavailable)
    }
}

/// The session store actor. Construct it with [`SessionStore::spawn`] or
/// [`SessionStore::spawn_with`].
pub struct SessionStore<K: Clock, G: TokenGenerator> {
    registry: SessionRegistry,
    clock: K,
    tokens: G,
    scheduler: TickScheduler,
    commands: mpsc::Receiver<SessionCommand>,
}

impl SessionStore<SystemClock, RandomTokens> {
    /// Spawns a store on the real clock with random tokens.
    pub fn spawn(config: SessionConfig) -> SessionStoreHandle {
        Self::spawn_with(config, SystemClock, RandomTokens)
    }
}

impl<K: Clock, G: TokenGenerator> SessionStore<K, G> {
    /// Spawns a store with an explicit time source and token generator.
    pub fn spawn_with(config: SessionConfig, clock: K, tokens: G) -> SessionStoreHandle {
        let config = config.validated();
        let (command_tx, command_rx) = mpsc::channel(config.channel_size);

        let actor = SessionStore {
            registry: SessionRegistry::new(&config),
            clock,
            tokens,
            scheduler: TickScheduler::every(config.sweep_interval),
            commands: command_rx,
        };

        tokio::spawn(actor.run());

        SessionStoreHandle {
            commands: command_tx,
        }
    }

    async fn run(mut self) {
        tracing::info!(
            sweep_interval = ?self.scheduler.interval(),
            "session store started"
        );

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(SessionCommand::RequestToken { reply }) => {
                        let _ = reply.send(self.create_session());
                    }
                    Some(SessionCommand::Find { token, reply }) => {
                        let _ = reply.send(self.registry.find(&token));
                    }
                    Some(SessionCommand::Patch { token, patch, reply }) => {
                        let _ = reply.send(self.patch_session(&token, &patch));
                    }
                    Some(SessionCommand::Sweep { reply }) => {
                        let _ = reply.send(self.sweep());
                    }
                    Some(SessionCommand::Len { reply }) => {
                        let _ = reply.send(self.registry.len());
                    }
                    Some(SessionCommand::Shutdown) | None => break,
                },
                info = self.scheduler.wait_for_tick() => {
                    tracing::trace!(tick = info.tick, skipped = info.ticks_skipped, "sweep tick");
                    self.sweep();
                    self.scheduler.record_tick_end();
                }
            }
        }

        tracing::info!(sessions = self.registry.len(), "session store stopped");
    }

    fn create_session(&mut self) -> Result<String, SessionError> {
        let token = self.tokens.generate();
        let now = self.clock.now();
        match self.registry.create(token, now) {
            Ok(session) => {
                let token = session.token.clone();
                tracing::info!(sessions = self.registry.len(), "session created");
                Ok(token)
            }
            Err(e) => {
                tracing::warn!("generated token collided with a live session");
                Err(e)
            }
        }
    }

    fn patch_session(&mut self, token: &str, patch: &SessionPatch) -> Result<(), SessionError> {
        let now = self.clock.now();
        let result = self.registry.patch(token, patch, now);
        match &result {
            Ok(()) => tracing::debug!(heartbeat = patch.is_heartbeat(), "session patched"),
            Err(e) => tracing::debug!(error = %e, "patch rejected"),
        }
        result
    }

    fn sweep(&mut self) -> usize {
        let removed = self.registry.sweep(self.clock.now()).len();
        if removed > 0 {
            tracing::info!(removed, remaining = self.registry.len(), "expired sessions swept");
        } else {
            tracing::trace!(remaining = self.registry.len(), "sweep found nothing");
        }
        removed
    }
}
