//! Cross-Instance Relay
//!
//! Pub/sub bridge that lets independently running hub processes
//! converge on one broadcast stream. Every persisted message is
//! published exactly once (by the delivery pipeline); every process
//! runs one subscriber task that feeds foreign-origin messages into
//! its local hub, identically to locally originated dispatches.
//!
//! Each envelope carries the publishing instance's origin id. The
//! subscriber skips its own origin, so a connection is reached exactly
//! once: by local dispatch on the publishing instance, by the relay
//! everywhere else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RelaySettings;
use crate::domain::Message;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Publish half of the relay, abstracted for the delivery pipeline.
#[async_trait]
pub trait RelayPublish: Send + Sync {
    /// Publish one persisted message onto the shared topic.
    async fn publish(&self, message: &Message) -> Result<(), AppError>;
}

/// Wire format on the relay topic.
#[derive(Debug, Serialize, Deserialize)]
pub struct RelayEnvelope {
    /// Instance that published this envelope
    pub origin: Uuid,
    pub message: Message,
}

impl RelayEnvelope {
    /// Whether this envelope was published by the given instance.
    pub fn is_from(&self, origin: Uuid) -> bool {
        self.origin == origin
    }
}

/// Redis pub/sub relay bus. One instance per process, identified by a
/// random origin id generated at startup.
pub struct RelayBus {
    client: Client,
    conn: redis::aio::ConnectionManager,
    topic: String,
    origin: Uuid,
    reconnect_delay: Duration,
}

impl RelayBus {
    pub fn new(
        client: Client,
        conn: redis::aio::ConnectionManager,
        settings: &RelaySettings,
    ) -> Self {
        Self {
            client,
            conn,
            topic: settings.topic.clone(),
            origin: Uuid::new_v4(),
            reconnect_delay: Duration::from_secs(settings.reconnect_delay_secs),
        }
    }

    /// Whether an incoming envelope should reach the local hub. Own
    /// publishes were already dispatched locally by the pipeline.
    fn accepts(&self, envelope: &RelayEnvelope) -> bool {
        !envelope.is_from(self.origin)
    }

    /// Run the per-process subscriber until shutdown. Connection loss
    /// degrades cross-instance delivery; the loop backs off and
    /// resubscribes, it never takes the process down.
    pub async fn run_subscriber<F>(self: Arc<Self>, on_message: F)
    where
        F: Fn(Arc<Message>) + Send + Sync + 'static,
    {
        loop {
            match self.client.get_async_pubsub().await {
                Ok(mut pubsub) => match pubsub.subscribe(&self.topic).await {
                    Ok(()) => {
                        info!(topic = %self.topic, origin = %self.origin, "Relay subscribed");
                        let mut stream = pubsub.on_message();
                        while let Some(msg) = stream.next().await {
                            let payload: String = match msg.get_payload() {
                                Ok(p) => p,
                                Err(e) => {
                                    warn!(error = %e, "Unreadable relay payload");
                                    continue;
                                }
                            };
                            match serde_json::from_str::<RelayEnvelope>(&payload) {
                                Ok(envelope) if self.accepts(&envelope) => {
                                    debug!(
                                        message_id = envelope.message.id,
                                        origin = %envelope.origin,
                                        "Relayed message received"
                                    );
                                    metrics::RELAY_MESSAGES
                                        .with_label_values(&["received"])
                                        .inc();
                                    on_message(Arc::new(envelope.message));
                                }
                                Ok(_) => {
                                    // Our own publish echoing back
                                }
                                Err(e) => {
                                    warn!(error = %e, "Malformed relay envelope");
                                }
                            }
                        }
                        warn!(topic = %self.topic, "Relay subscription stream ended");
                    }
                    Err(e) => {
                        warn!(error = %e, topic = %self.topic, "Relay subscribe failed");
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Relay pub/sub connection failed");
                }
            }

            tokio::time::sleep(self.reconnect_delay).await;
        }
    }
}

#[async_trait]
impl RelayPublish for RelayBus {
    async fn publish(&self, message: &Message) -> Result<(), AppError> {
        let envelope = RelayEnvelope {
            origin: self.origin,
            message: message.clone(),
        };
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| AppError::Internal(format!("Relay serialization failed: {}", e)))?;

        let mut conn = self.conn.clone();
        let _: () = conn.publish(&self.topic, payload).await?;

        metrics::RELAY_MESSAGES.with_label_values(&["published"]).inc();
        debug!(message_id = message.id, topic = %self.topic, "Message relayed");
        Ok(())
    }
}

impl std::fmt::Debug for RelayBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayBus")
            .field("topic", &self.topic)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
