//! Connection hub integration tests.
//!
//! Exercises registration, fanout, and slow-consumer handling through
//! the public hub handle, the same surface sessions use.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use chat_hub::domain::{Message, MessageKind};
use chat_hub::presentation::websocket::{Connection, Hub};

const MAILBOX_CAPACITY: usize = 256;

fn public_message(id: i64, content: &str) -> Arc<Message> {
    Arc::new(Message {
        id,
        kind: MessageKind::Public,
        content: content.to_string(),
        user_id: 1,
        username: "alice".into(),
        receiver_id: None,
        group_id: None,
        created_at: Utc::now(),
    })
}

fn client(
    user_id: i64,
    capacity: usize,
) -> (Connection, mpsc::Receiver<Arc<Message>>, Uuid) {
    let (tx, rx) = mpsc::channel(capacity);
    let id = Uuid::new_v4();
    let connection = Connection {
        id,
        user_id,
        username: format!("user-{user_id}"),
        groups: Vec::new(),
        mailbox: tx,
    };
    (connection, rx, id)
}

#[tokio::test]
async fn two_clients_both_receive_a_public_message() {
    let hub = Hub::spawn();

    let (alice, mut alice_rx, _) = client(1, MAILBOX_CAPACITY);
    let (bob, mut bob_rx, _) = client(2, MAILBOX_CAPACITY);
    hub.register(alice);
    hub.register(bob);

    hub.dispatch(public_message(1, "hello"));

    let got_alice = alice_rx.recv().await.expect("alice should receive");
    let got_bob = bob_rx.recv().await.expect("bob should receive");
    assert_eq!(got_alice.content, "hello");
    assert_eq!(got_bob.content, "hello");
}

#[tokio::test]
async fn burst_beyond_mailbox_capacity_drops_the_stalled_client() {
    let hub = Hub::spawn();

    // One client drains nothing while 300 messages arrive
    let (stalled, mut stalled_rx, _) = client(1, MAILBOX_CAPACITY);
    let (healthy, mut healthy_rx, _) = client(2, 512);
    hub.register(stalled);
    hub.register(healthy);

    let burst = MAILBOX_CAPACITY + 44;
    for i in 0..burst {
        hub.dispatch(public_message(i as i64, "burst"));
    }

    // The healthy client sees the full burst
    for _ in 0..burst {
        assert!(healthy_rx.recv().await.is_some());
    }

    // The stalled client was removed when its mailbox filled: it holds
    // exactly a mailbox's worth, then its channel is closed
    let mut delivered = 0;
    while stalled_rx.recv().await.is_some() {
        delivered += 1;
    }
    assert_eq!(delivered, MAILBOX_CAPACITY);

    assert_eq!(hub.connection_count(), 1);
}

#[tokio::test]
async fn unregistered_client_stops_receiving_and_its_mailbox_closes() {
    let hub = Hub::spawn();

    let (conn, mut rx, id) = client(1, MAILBOX_CAPACITY);
    hub.register(conn);

    hub.dispatch(public_message(1, "before"));
    hub.unregister(id);
    hub.dispatch(public_message(2, "after"));

    // The queued message is still drainable, then the channel closes;
    // nothing dispatched after removal ever arrives
    assert_eq!(rx.recv().await.map(|m| m.content.clone()), Some("before".into()));
    assert!(rx.recv().await.is_none());
    assert_eq!(hub.connection_count(), 0);
}
