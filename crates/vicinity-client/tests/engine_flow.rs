//! End-to-end engine tests over a real loopback WebSocket server:
//! inbound frames land in the store before fan-out, unread badges
//! track them, and reading a conversation clears the counts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

use vicinity_client::{ClientConfig, EngineError, Session, SyncEngine, UnreadBadge};
use vicinity_net::ChannelState;
use vicinity_shared::{ChatKind, UserProfile, WireMessage};
use vicinity_store::Database;

const SELF_ID: i64 = 1;
const PEER_ID: i64 = 2;

fn profile(id: i64) -> UserProfile {
    UserProfile {
        id,
        username: format!("user-{id}"),
        image_url: String::new(),
        latitude: 48.85,
        longitude: 2.35,
        visible: true,
        created_at: Utc::now(),
        last_active: Utc::now(),
    }
}

async fn start_ws_server() -> (String, mpsc::UnboundedReceiver<WebSocketStream<TcpStream>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let Ok(ws) = accept_async(stream).await else {
                continue;
            };
            if conn_tx.send(ws).is_err() {
                break;
            }
        }
    });

    (format!("http://{addr}"), conn_rx)
}

async fn start_engine(base_url: String) -> (Arc<SyncEngine>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("test.db")).unwrap();

    let config = ClientConfig { base_url };
    let session = Session::sign_in(Some(profile(SELF_ID))).unwrap();
    let engine = Arc::new(SyncEngine::start(&config, session, db));

    (engine, dir)
}

async fn wait_for_open(engine: &SyncEngine) {
    let mut state_rx = engine.state_watch();
    timeout(Duration::from_secs(5), async {
        while *state_rx.borrow() != ChannelState::Open {
            state_rx.changed().await.unwrap();
        }
    })
    .await
    .expect("channel never opened");
}

/// Wait until the badge publishes `expected`.
async fn wait_for_count(badge: &UnreadBadge, expected: u64) {
    let mut counts = badge.counts();
    timeout(Duration::from_secs(5), async {
        while *counts.borrow() != expected {
            counts.changed().await.unwrap();
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "badge never reached {expected}, last value {}",
            badge.current()
        )
    });
}

#[tokio::test]
async fn inbound_message_is_persisted_before_fanout_and_counted() {
    let (base_url, mut conn_rx) = start_ws_server().await;
    let (engine, _dir) = start_engine(base_url).await;

    let mut server = conn_rx.recv().await.unwrap();
    wait_for_open(&engine).await;

    let badge = UnreadBadge::spawn(&engine, PEER_ID);
    assert_eq!(badge.current(), 0);

    // A subscriber can re-query the store during fan-out and must see
    // the message it is being notified about.
    let saw_in_store = Arc::new(AtomicBool::new(false));
    let saw_clone = saw_in_store.clone();
    let engine_clone = engine.clone();
    let subscription = engine.subscribe(move |inbound| {
        let history = engine_clone.conversation(PEER_ID, ChatKind::User);
        if history.iter().any(|m| Some(m.id) == inbound.stored.as_ref().map(|s| s.id)) {
            saw_clone.store(true, Ordering::SeqCst);
        }
    });

    let frame = WireMessage::direct(PEER_ID, "user-2", SELF_ID, "hi");
    server
        .send(Message::Text(frame.to_json().unwrap()))
        .await
        .unwrap();

    // Badge increments to one unread from the peer.
    wait_for_count(&badge, 1).await;
    assert!(saw_in_store.load(Ordering::SeqCst));

    // The stored row has the inbound direction, unread.
    let history = engine.conversation(PEER_ID, ChatKind::User);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender_id, PEER_ID);
    assert_eq!(history[0].conversation_id, SELF_ID);
    assert_eq!(history[0].chat_kind, ChatKind::User);
    assert!(!history[0].is_read);

    // Opening the conversation marks everything read.
    engine.mark_conversation_read(&history);
    assert_eq!(engine.unread_count(PEER_ID), 0);
    wait_for_count(&badge, 0).await;

    drop(subscription);
    engine.shutdown();
}

#[tokio::test]
async fn outbound_send_reaches_server_and_store() {
    let (base_url, mut conn_rx) = start_ws_server().await;
    let (engine, _dir) = start_engine(base_url).await;

    let mut server = conn_rx.recv().await.unwrap();
    wait_for_open(&engine).await;

    let sent = engine
        .send_message(ChatKind::User, PEER_ID, "hello out there")
        .unwrap();
    assert_eq!(sent.receiver_id, Some(PEER_ID));

    // The frame arrives at the server...
    let frame = timeout(Duration::from_secs(5), server.next())
        .await
        .expect("frame")
        .unwrap()
        .unwrap();
    let Message::Text(text) = frame else {
        panic!("expected text frame");
    };
    assert_eq!(WireMessage::from_json(&text).unwrap(), sent);

    // ...and the optimistic local copy is queryable.
    let history = engine.conversation(PEER_ID, ChatKind::User);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].sender_id, SELF_ID);
    assert_eq!(history[0].content, "hello out there");

    engine.shutdown();
}

#[tokio::test]
async fn send_while_offline_is_rejected_and_not_stored() {
    // Dead port: the channel cycles between connecting and closed.
    let (engine, _dir) = start_engine("http://127.0.0.1:9".to_string()).await;

    // Give the first connect attempt time to fail.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let err = engine
        .send_message(ChatKind::User, PEER_ID, "lost")
        .unwrap_err();
    assert!(matches!(err, EngineError::Offline));

    // Nothing was queued or stored: the caller owns the failure.
    assert!(engine.conversation(PEER_ID, ChatKind::User).is_empty());

    engine.shutdown();
}
