//! WebSocket Session
//!
//! One session per upgraded connection, split into a read loop and a
//! write task. The read loop parses inbound frames and feeds them to
//! the delivery pipeline; the write task drains the mailbox the hub
//! fills, coalescing bursts into batched frames.
//!
//! Teardown is cooperative in both directions. The hub holds the only
//! mailbox sender, so unregistering closes the mailbox and the write
//! task drains what is left and stops. When the write task stops first,
//! it closes the sink and the session drops the read half, so a peer
//! that keeps sending cannot outlive its own delivery path.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Extension, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{stream::SplitStream, Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};
use uuid::Uuid;

use super::frames::InboundFrame;
use super::hub::{Connection, HubHandle};
use crate::application::services::DeliveryService;
use crate::config::WebSocketSettings;
use crate::domain::{GroupRepository, Message};
use crate::infrastructure::cache::RedisCache;
use crate::infrastructure::repositories::{PgGroupRepository, PgMessageRepository};
use crate::presentation::middleware::AuthUser;
use crate::startup::AppState;

/// WebSocket upgrade handler. Authentication already ran as route
/// middleware, so the user identity arrives as an extension.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Response {
    let ws = ws
        .max_message_size(state.settings.websocket.max_message_size)
        .max_frame_size(state.settings.websocket.max_frame_size);

    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

/// Drive one connection from upgrade to teardown.
async fn handle_socket(socket: WebSocket, state: AppState, auth: AuthUser) {
    let connection_id = Uuid::new_v4();

    let group_repo = Arc::new(PgGroupRepository::new(state.db.clone()));

    // Memberships are loaded once per session; a user joining a group
    // mid-session reconnects to pick it up
    let groups = match group_repo.member_group_ids(auth.user_id).await {
        Ok(groups) => groups,
        Err(e) => {
            tracing::error!(user_id = auth.user_id, error = %e, "Failed to load group memberships");
            return;
        }
    };

    tracing::debug!(
        connection_id = %connection_id,
        user_id = auth.user_id,
        groups = groups.len(),
        "WebSocket session started"
    );

    let (mailbox_tx, mailbox_rx) =
        mpsc::channel::<Arc<Message>>(state.settings.websocket.mailbox_capacity);

    // The sender moves into the hub; this session keeps only the
    // receiver, so hub-side removal closes the channel
    state.hub.register(Connection {
        id: connection_id,
        user_id: auth.user_id,
        username: auth.username.clone(),
        groups,
        mailbox: mailbox_tx,
    });

    let delivery = DeliveryService::new(
        Arc::new(PgMessageRepository::new(state.db.clone())),
        group_repo,
        state.cache.clone(),
        state.hub.clone(),
        state.relay.clone(),
    );

    let (sink, stream) = socket.split();

    let mut writer = tokio::spawn(write_task(
        sink,
        mailbox_rx,
        state.hub.clone(),
        connection_id,
        state.settings.websocket.clone(),
    ));

    // Either half ending tears the other down: a finished write task
    // drops the read loop here, and the unregister below closes the
    // mailbox so a finished read loop ends the write task.
    let writer_done = tokio::select! {
        _ = read_loop(stream, &delivery, &auth, &state, connection_id) => false,
        _ = &mut writer => true,
    };

    state.hub.unregister(connection_id);
    if !writer_done {
        let _ = writer.await;
    }

    tracing::debug!(connection_id = %connection_id, user_id = auth.user_id, "WebSocket session ended");
}

/// Read inbound frames until the peer goes away or falls silent past
/// the read deadline. Submission failures are reported in the log and
/// never end the session; the socket itself decides its lifetime.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    delivery: &DeliveryService<PgMessageRepository, PgGroupRepository, RedisCache>,
    auth: &AuthUser,
    state: &AppState,
    connection_id: Uuid,
) {
    let read_deadline = state.settings.websocket.read_deadline();

    loop {
        let frame = match timeout(read_deadline, stream.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket read error");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::debug!(connection_id = %connection_id, "Read deadline exceeded, peer presumed dead");
                break;
            }
        };

        match frame {
            WsMessage::Text(text) => {
                let inbound: InboundFrame = match serde_json::from_str(&text) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "Malformed inbound frame dropped");
                        continue;
                    }
                };

                let draft = match inbound.into_draft(auth.user_id, &auth.username) {
                    Ok(draft) => draft,
                    Err(e) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "Invalid inbound frame dropped");
                        continue;
                    }
                };

                if let Err(e) = delivery.submit(draft).await {
                    if e.is_client_fault() {
                        tracing::debug!(connection_id = %connection_id, error = %e, "Submission rejected");
                    } else {
                        tracing::error!(connection_id = %connection_id, error = %e, "Submission failed");
                    }
                }
            }
            WsMessage::Close(_) => break,
            // Pings are answered by axum; pongs arriving here have
            // already reset the read deadline by being received
            WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Binary(_) => {}
        }
    }
}

/// Drain the mailbox into the socket. A burst of queued messages is
/// coalesced into one newline-delimited frame per write. Keepalive
/// probes go out while the mailbox is quiet.
///
/// Every exit path leaves the sink closed so the read half observes
/// socket closure instead of idling until its deadline.
async fn write_task<S>(
    mut sink: S,
    mut mailbox: mpsc::Receiver<Arc<Message>>,
    hub: HubHandle,
    connection_id: Uuid,
    settings: WebSocketSettings,
) where
    S: Sink<WsMessage> + Unpin + Send,
    S::Error: std::fmt::Display,
{
    let write_deadline = settings.write_deadline();
    let probe_interval = settings.probe_interval();
    let mut probe = interval_at(Instant::now() + probe_interval, probe_interval);
    probe.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = mailbox.recv() => match received {
                Some(first) => {
                    let mut payload = match serde_json::to_string(&*first) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!(connection_id = %connection_id, error = %e, "Failed to serialize message");
                            continue;
                        }
                    };

                    // Coalesce whatever else is already queued
                    while let Ok(next) = mailbox.try_recv() {
                        match serde_json::to_string(&*next) {
                            Ok(json) => {
                                payload.push('\n');
                                payload.push_str(&json);
                            }
                            Err(e) => {
                                tracing::error!(connection_id = %connection_id, error = %e, "Failed to serialize message");
                            }
                        }
                    }

                    let write = sink.send(WsMessage::Text(payload.into()));
                    match timeout(write_deadline, write).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket write failed");
                            hub.unregister(connection_id);
                            let _ = sink.close().await;
                            break;
                        }
                        Err(_) => {
                            tracing::debug!(connection_id = %connection_id, "Write deadline exceeded");
                            hub.unregister(connection_id);
                            let _ = sink.close().await;
                            break;
                        }
                    }
                }
                // Mailbox closed: the hub removed this connection
                None => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    let _ = sink.close().await;
                    break;
                }
            },
            _ = probe.tick() => {
                let ping = sink.send(WsMessage::Ping(Vec::new().into()));
                match timeout(write_deadline, ping).await {
                    Ok(Ok(())) => {}
                    _ => {
                        tracing::debug!(connection_id = %connection_id, "Keepalive probe failed");
                        hub.unregister(connection_id);
                        let _ = sink.close().await;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::domain::MessageKind;
    use crate::presentation::websocket::hub::Hub;

    /// Accepts every frame and records it for inspection.
    #[derive(Default)]
    struct RecordingSink {
        frames: Arc<Mutex<Vec<WsMessage>>>,
    }

    impl Sink<WsMessage> for RecordingSink {
        type Error = std::io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, item: WsMessage) -> Result<(), Self::Error> {
            self.frames.lock().unwrap().push(item);
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    /// Fails every write, as a socket whose peer is gone does.
    struct BrokenSink;

    impl Sink<WsMessage> for BrokenSink {
        type Error = std::io::Error;

        fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn start_send(self: Pin<&mut Self>, _item: WsMessage) -> Result<(), Self::Error> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Err(std::io::ErrorKind::BrokenPipe.into()))
        }

        fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn ws_settings() -> WebSocketSettings {
        WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            mailbox_capacity: 8,
            read_deadline_secs: 60,
            write_deadline_secs: 1,
        }
    }

    fn message() -> Message {
        Message {
            id: 1,
            kind: MessageKind::Public,
            content: "hello".to_string(),
            user_id: 1,
            username: "alice".to_string(),
            receiver_id: None,
            group_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn closed_mailbox_ends_the_write_task_with_a_close_frame() {
        let hub = Hub::spawn();
        let sink = RecordingSink::default();
        let frames = sink.frames.clone();

        let (tx, rx) = mpsc::channel::<Arc<Message>>(8);
        drop(tx);

        write_task(sink, rx, hub, Uuid::new_v4(), ws_settings()).await;

        let frames = frames.lock().unwrap();
        assert!(matches!(frames.as_slice(), [WsMessage::Close(None)]));
    }

    #[tokio::test]
    async fn write_failure_unregisters_the_connection_and_ends_the_task() {
        let hub = Hub::spawn();
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel::<Arc<Message>>(8);

        hub.register(Connection {
            id: connection_id,
            user_id: 1,
            username: "alice".to_string(),
            groups: Vec::new(),
            mailbox: tx,
        });
        hub.dispatch(Arc::new(message()));

        // The broken sink fails the write, so the task must remove the
        // connection and return instead of looping
        write_task(BrokenSink, rx, hub.clone(), connection_id, ws_settings()).await;

        let deadline = Instant::now() + Duration::from_secs(1);
        while hub.connection_count() != 0 {
            assert!(Instant::now() < deadline, "connection was never unregistered");
            tokio::task::yield_now().await;
        }
    }
}
