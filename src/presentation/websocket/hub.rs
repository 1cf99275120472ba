//! Connection Registry (Hub)
//!
//! One hub task per process owns the live-connection set. Sessions
//! never touch the set directly: register, unregister, and dispatch
//! all arrive as commands on one queue and are processed in strict
//! arrival order, so the set is never observed in an inconsistent
//! state.
//!
//! Dispatch is non-blocking. Each connection has a bounded mailbox;
//! a full mailbox marks the connection as a slow consumer and removes
//! it on the spot, so one stalled reader can never hold up global
//! fanout or the hub's own command processing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::domain::Message;
use crate::infrastructure::metrics;

/// A live connection as the hub sees it. The hub holds the only
/// mailbox sender, so removing the connection closes the mailbox and
/// signals the session's write task to drain and stop.
pub struct Connection {
    pub id: Uuid,
    pub user_id: i64,
    pub username: String,
    /// Group memberships loaded at session start, for dispatch targeting
    pub groups: Vec<i64>,
    pub mailbox: mpsc::Sender<Arc<Message>>,
}

enum HubCommand {
    Register(Connection),
    Unregister(Uuid),
    Dispatch(Arc<Message>),
}

/// Cheaply cloneable handle through which sessions, the delivery
/// pipeline, and the relay subscriber reach the hub task.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<HubCommand>,
    live: Arc<AtomicUsize>,
}

impl HubHandle {
    /// Add a connection to the live set.
    pub fn register(&self, connection: Connection) {
        let _ = self.commands.send(HubCommand::Register(connection));
    }

    /// Remove a connection. Idempotent; unknown ids are ignored.
    pub fn unregister(&self, connection_id: Uuid) {
        let _ = self.commands.send(HubCommand::Unregister(connection_id));
    }

    /// Fan a persisted message out to every in-scope connection.
    pub fn dispatch(&self, message: Arc<Message>) {
        let _ = self.commands.send(HubCommand::Dispatch(message));
    }

    /// Number of live connections, for health and metrics.
    pub fn connection_count(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }
}

/// The hub task state. Constructed and spawned via [`Hub::spawn`].
pub struct Hub {
    commands: mpsc::UnboundedReceiver<HubCommand>,
    connections: HashMap<Uuid, Connection>,
    live: Arc<AtomicUsize>,
}

impl Hub {
    /// Spawn the hub task and return its handle.
    pub fn spawn() -> HubHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let live = Arc::new(AtomicUsize::new(0));

        let hub = Hub {
            commands: rx,
            connections: HashMap::new(),
            live: live.clone(),
        };
        tokio::spawn(hub.run());

        HubHandle { commands: tx, live }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                HubCommand::Register(connection) => self.register(connection),
                HubCommand::Unregister(id) => self.unregister(id),
                HubCommand::Dispatch(message) => self.dispatch(message),
            }
        }
        tracing::debug!("Hub command channel closed, hub task exiting");
    }

    fn register(&mut self, connection: Connection) {
        tracing::info!(
            connection_id = %connection.id,
            user_id = connection.user_id,
            username = %connection.username,
            "Connection registered"
        );
        self.connections.insert(connection.id, connection);
        self.publish_count();
    }

    fn unregister(&mut self, id: Uuid) {
        // Dropping the connection drops the only mailbox sender, which
        // closes the mailbox for the write task.
        if let Some(connection) = self.connections.remove(&id) {
            tracing::info!(
                connection_id = %id,
                user_id = connection.user_id,
                "Connection unregistered"
            );
            self.publish_count();
        }
    }

    fn dispatch(&mut self, message: Arc<Message>) {
        let mut slow: Vec<Uuid> = Vec::new();

        for connection in self.connections.values() {
            if !message.is_visible_to(connection.user_id, &connection.groups) {
                continue;
            }

            match connection.mailbox.try_send(message.clone()) {
                Ok(()) => metrics::record_delivered(),
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        connection_id = %connection.id,
                        user_id = connection.user_id,
                        "Mailbox full, dropping slow consumer"
                    );
                    metrics::record_slow_consumer_drop();
                    slow.push(connection.id);
                }
                Err(TrySendError::Closed(_)) => {
                    // Write task already gone; reap the entry
                    slow.push(connection.id);
                }
            }
        }

        for id in slow {
            self.unregister(id);
        }
    }

    fn publish_count(&self) {
        let count = self.connections.len();
        self.live.store(count, Ordering::Relaxed);
        metrics::CONNECTIONS_ACTIVE.set(count as i64);
    }
}
