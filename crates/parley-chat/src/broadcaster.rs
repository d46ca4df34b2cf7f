//! Chat broadcaster actor: one Tokio task that owns the message log and
//! every client's delivery cursor.
//!
//! The actor multiplexes four inputs in a single `select!` loop:
//!
//! - control commands from [`ChatHandle`] (register, unregister, stats, shutdown)
//! - inbound chat text from per-connection read tasks (bounded channel)
//! - departures reported by read tasks when a connection closes or fails
//! - the delivery tick
//!
//! Nothing outside the task ever touches the log or the cursor table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parley_tick::TickScheduler;
use parley_transport::{Connection, Frame};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{ChatConfig, ChatError, MessageLog};

/// Identifies a registered client within one broadcaster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// A point-in-time summary of the broadcaster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatStats {
    /// Currently registered clients.
    pub clients: usize,
    /// Revision of the newest message.
    pub revision: u64,
    /// Messages currently retained in the log.
    pub retained: usize,
    /// Delivery ticks run so far.
    pub ticks: u64,
}

/// Commands sent to the broadcaster through its control channel.
enum ChatCommand<C> {
    /// Start tracking a connection and spawn its read task.
    Register {
        conn: C,
        reply: oneshot::Sender<ClientId>,
    },

    /// Stop tracking a client. No-op for unknown ids.
    Unregister { client_id: ClientId },

    /// Report current counters.
    Stats { reply: oneshot::Sender<ChatStats> },

    /// Stop the actor and drop every connection.
    Shutdown,
}

/// Handle to a running broadcaster. Cheap to clone.
///
/// When every handle has been dropped the actor shuts itself down.
pub struct ChatHandle<C: Connection> {
    commands: mpsc::Sender<ChatCommand<C>>,
    inbound: mpsc::Sender<String>,
}

impl<C: Connection> Clone for ChatHandle<C> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            inbound: self.inbound.clone(),
        }
    }
}

impl<C: Connection> ChatHandle<C> {
    /// Registers a connection. The client starts at revision 0 and so
    /// receives the whole retained backlog on the next tick.
    pub async fn register(&self, conn: C) -> Result<ClientId, ChatError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ChatCommand::Register {
                conn,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ChatError::Unavailable)?;
        reply_rx.await.map_err(|_| ChatError::Unavailable)
    }

    /// Unregisters a client. Unknown or already-removed ids are ignored.
    pub async fn unregister(&self, client_id: ClientId) -> Result<(), ChatError> {
        self.commands
            .send(ChatCommand::Unregister { client_id })
            .await
            .map_err(|_| ChatError::Unavailable)
    }

    /// Appends a message to the log as if a client had sent it.
    ///
    /// Shares the bounded inbound channel with the read tasks, so this
    /// waits when the broadcaster is backed up.
    pub async fn publish(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.inbound
            .send(text.into())
            .await
            .map_err(|_| ChatError::Unavailable)
    }

    /// Requests current counters.
    pub async fn stats(&self) -> Result<ChatStats, ChatError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ChatCommand::Stats { reply: reply_tx })
            .await
            .map_err(|_| ChatError::Unavailable)?;
        reply_rx.await.map_err(|_| ChatError::Unavailable)
    }

    /// Tells the broadcaster to stop.
    pub async fn shutdown(&self) -> Result<(), ChatError> {
        self.commands
            .send(ChatCommand::Shutdown)
            .await
            .map_err(|_| ChatError::Unavailable)
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Per-client state. Owned exclusively by the actor.
struct Client<C> {
    conn: Arc<C>,
    /// Revision of the newest message already sent to this client.
    last_delivered: u64,
    reader: JoinHandle<()>,
}

/// The broadcaster actor. Construct it with [`ChatBroadcaster::spawn`].
pub struct ChatBroadcaster<C: Connection> {
    log: MessageLog,
    clients: HashMap<ClientId, Client<C>>,
    next_client_id: u64,
    scheduler: TickScheduler,
    send_timeout: Duration,
    commands: mpsc::Receiver<ChatCommand<C>>,
    inbound_rx: mpsc::Receiver<String>,
    /// Cloned into each read task.
    inbound_tx: mpsc::Sender<String>,
    departures_rx: mpsc::UnboundedReceiver<ClientId>,
    departures_tx: mpsc::UnboundedSender<ClientId>,
}

impl<C: Connection> ChatBroadcaster<C> {
    /// Spawns a broadcaster task and returns a handle to it.
    pub fn spawn(config: ChatConfig) -> ChatHandle<C> {
        let config = config.validated();
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity);
        let (departures_tx, departures_rx) = mpsc::unbounded_channel();

        let actor = ChatBroadcaster {
            log: MessageLog::new(config.log_capacity),
            clients: HashMap::new(),
            next_client_id: 1,
            scheduler: TickScheduler::new(config.tick_config()),
            send_timeout: config.send_timeout,
            commands: command_rx,
            inbound_rx,
            inbound_tx: inbound_tx.clone(),
            departures_rx,
            departures_tx,
        };

        tokio::spawn(actor.run());

        ChatHandle {
            commands: command_tx,
            inbound: inbound_tx,
        }
    }

    /// Runs the actor loop until shutdown or until every handle is dropped.
    async fn run(mut self) {
        tracing::info!(
            capacity = self.log.capacity(),
            interval = ?self.scheduler.interval(),
            "chat broadcaster started"
        );

        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(ChatCommand::Register { conn, reply }) => {
                        let client_id = self.handle_register(conn);
                        let _ = reply.send(client_id);
                    }
                    Some(ChatCommand::Unregister { client_id }) => {
                        self.remove_client(client_id, "unregistered");
                    }
                    Some(ChatCommand::Stats { reply }) => {
                        let _ = reply.send(self.stats());
                    }
                    Some(ChatCommand::Shutdown) | None => break,
                },
                Some(text) = self.inbound_rx.recv() => {
                    self.log.append(text);
                }
                Some(client_id) = self.departures_rx.recv() => {
                    self.remove_client(client_id, "connection closed");
                }
                info = self.scheduler.wait_for_tick() => {
                    tracing::trace!(tick = info.tick, skipped = info.ticks_skipped, "delivery tick");
                    self.deliver().await;
                    self.scheduler.record_tick_end();
                }
            }
        }

        self.close_all().await;
        tracing::info!(revision = self.log.revision(), "chat broadcaster stopped");
    }

    fn handle_register(&mut self, conn: C) -> ClientId {
        let client_id = ClientId(self.next_client_id);
        self.next_client_id += 1;

        let conn = Arc::new(conn);
        let reader = tokio::spawn(read_loop(
            client_id,
            Arc::clone(&conn),
            self.inbound_tx.clone(),
            self.departures_tx.clone(),
        ));

        tracing::info!(
            %client_id,
            conn_id = %conn.id(),
            clients = self.clients.len() + 1,
            "client registered"
        );
        self.clients.insert(
            client_id,
            Client {
                conn,
                last_delivered: 0,
                reader,
            },
        );
        client_id
    }

    fn remove_client(&mut self, client_id: ClientId, reason: &'static str) {
        if let Some(client) = self.clients.remove(&client_id) {
            client.reader.abort();
            tracing::info!(
                %client_id,
                reason,
                clients = self.clients.len(),
                "client removed"
            );
        }
    }

    /// Catch-up delivery: send every client what it has not seen yet.
    ///
    /// A write that fails or exceeds `send_timeout` removes the client,
    /// the same as a failed read.
    async fn deliver(&mut self) {
        let revision = self.log.revision();
        let mut batches: HashMap<u64, Vec<String>> = HashMap::new();
        let mut failed = Vec::new();

        for (client_id, client) in self.clients.iter_mut() {
            let pending = self.log.pending_since(client.last_delivered);
            if pending == 0 {
                continue;
            }

            let batch = batches
                .entry(client.last_delivered)
                .or_insert_with(|| self.log.produce_since(client.last_delivered));
            let lost = pending - batch.len() as u64;
            if lost > 0 {
                tracing::debug!(%client_id, lost, "client fell behind log capacity");
            }
            tracing::trace!(
                %client_id,
                from = client.last_delivered,
                to = revision,
                count = batch.len(),
                "delivering"
            );

            for text in batch.iter() {
                match tokio::time::timeout(self.send_timeout, client.conn.send_text(text)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!(%client_id, error = %e, "delivery failed");
                        failed.push(*client_id);
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(%client_id, "delivery timed out");
                        failed.push(*client_id);
                        break;
                    }
                }
            }
            client.last_delivered = revision;
        }

        for client_id in failed {
            self.remove_client(client_id, "delivery failed");
        }
    }

    fn stats(&self) -> ChatStats {
        ChatStats {
            clients: self.clients.len(),
            revision: self.log.revision(),
            retained: self.log.len(),
            ticks: self.scheduler.tick_count(),
        }
    }

    async fn close_all(&mut self) {
        for (client_id, client) in self.clients.drain() {
            client.reader.abort();
            if let Ok(Err(e)) =
                tokio::time::timeout(self.send_timeout, client.conn.close()).await
            {
                tracing::debug!(%client_id, error = %e, "close failed");
            }
        }
    }
}

/// Per-connection read task: forwards text frames, reports departure.
async fn read_loop<C: Connection>(
    client_id: ClientId,
    conn: Arc<C>,
    inbound: mpsc::Sender<String>,
    departures: mpsc::UnboundedSender<ClientId>,
) {
    loop {
        match conn.recv().await {
            Ok(Some(Frame::Text(text))) => {
                // Blocks while the inbound channel is full.
                if inbound.send(text).await.is_err() {
                    return;
                }
            }
            Ok(Some(Frame::Binary(_))) => {
                tracing::trace!(%client_id, "ignoring binary frame");
            }
            Ok(None) => {
                tracing::debug!(%client_id, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "read failed");
                break;
            }
        }
    }
    let _ = departures.send(client_id);
}
