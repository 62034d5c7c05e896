//! Integration tests for the relay: real WebSocket clients against a server
//! on a random port, backed by the in-memory store.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use huddle::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

struct TestServer {
    addr: String,
    store: Arc<MemoryStore>,
}

async fn start_server() -> TestServer {
    start_server_with(ServerConfig::default(), CallConfig::default()).await
}

async fn start_server_with(server_config: ServerConfig, call_config: CallConfig) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    let server = HuddleServerBuilder::new()
        .bind("127.0.0.1:0")
        .server_config(server_config)
        .call_config(call_config)
        .build(StoreAuthenticator::new(Arc::clone(&store)), Arc::clone(&store))
        .await
        .expect("server should build");

    let addr = server.local_addr().expect("should have local addr").to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer { addr, store }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("send");
}

/// Next JSON event, skipping control frames.
async fn next_event(ws: &mut ClientWs) -> Value {
    loop {
        let msg = tokio::time::timeout(EVENT_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for an event")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).expect("valid JSON"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("expected a text frame, got {other:?}"),
        }
    }
}

async fn handshake(ws: &mut ClientWs, token: &str) -> Value {
    send_json(ws, json!({"version": PROTOCOL_VERSION, "sessionId": token})).await;
    next_event(ws).await
}

/// Adds a user to the store, connects, and completes the handshake.
/// Returns the socket and the user's id.
async fn login(server: &TestServer, username: &str) -> (ClientWs, u64) {
    let (identity, token) = server.store.add_user(username).await;
    let ws = login_with_token(server, &token, identity.id.0, username).await;
    (ws, identity.id.0)
}

async fn login_with_token(server: &TestServer, token: &str, id: u64, username: &str) -> ClientWs {
    let mut ws = connect(&server.addr).await;
    let ack = handshake(&mut ws, token).await;
    assert_eq!(
        ack,
        json!({"event": "connected", "data": {"id": id, "username": username}})
    );
    ws
}

/// Round-trips a ping and returns every event that arrived before the
/// matching pong.
///
/// Events for a connection share one queue, so once the pong is back every
/// event the server produced for this connection before handling the ping
/// has been read.
async fn settle(ws: &mut ClientWs) -> Vec<Value> {
    static MARKER: AtomicU64 = AtomicU64::new(1);
    let marker = MARKER.fetch_add(1, Ordering::Relaxed);
    send_json(ws, json!({"event": "ping", "data": {"clientTime": marker}})).await;

    let mut events = Vec::new();
    loop {
        let event = next_event(ws).await;
        if event["event"] == "pong" && event["data"]["clientTime"] == marker {
            return events;
        }
        events.push(event);
    }
}

async fn expect_closed(ws: &mut ClientWs) {
    match tokio::time::timeout(EVENT_TIMEOUT, ws.next()).await {
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Ok(Some(Err(_))) => {}
        other => panic!("expected close, got {other:?}"),
    }
}

async fn join_room(ws: &mut ClientWs, room_id: u64) -> Vec<Value> {
    send_json(ws, json!({"event": "joinRoom", "data": room_id})).await;
    settle(ws).await
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_valid_session_returns_connected() {
    let server = start_server().await;
    let (_ws, id) = login(&server, "alice").await;
    assert_eq!(id, 1);
}

#[tokio::test]
async fn test_handshake_touches_last_active() {
    let server = start_server().await;
    let (_ws, id) = login(&server, "alice").await;

    for _ in 0..50 {
        if server.store.last_active(UserId(id)).await.is_some() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("last-active was never touched");
}

#[tokio::test]
async fn test_handshake_unknown_session_is_401_and_closes() {
    let server = start_server().await;
    let mut ws = connect(&server.addr).await;

    let reply = handshake(&mut ws, "not-a-session").await;
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["code"], 401);
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_handshake_missing_session_id_is_401() {
    let server = start_server().await;
    let mut ws = connect(&server.addr).await;

    send_json(&mut ws, json!({"version": PROTOCOL_VERSION})).await;
    let reply = next_event(&mut ws).await;
    assert_eq!(reply["data"]["code"], 401);
}

#[tokio::test]
async fn test_handshake_store_down_is_503() {
    let server = start_server().await;
    let (_, token) = server.store.add_user("alice").await;
    server.store.set_available(false);

    let mut ws = connect(&server.addr).await;
    let reply = handshake(&mut ws, &token).await;
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["code"], 503);
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_handshake_version_mismatch_is_400() {
    let server = start_server().await;
    let (_, token) = server.store.add_user("alice").await;
    let mut ws = connect(&server.addr).await;

    send_json(&mut ws, json!({"version": 999, "sessionId": token})).await;
    let reply = next_event(&mut ws).await;
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["code"], 400);
    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_handshake_event_instead_of_handshake_is_400() {
    let server = start_server().await;
    let mut ws = connect(&server.addr).await;

    send_json(&mut ws, json!({"event": "joinRoom", "data": 5})).await;
    let reply = next_event(&mut ws).await;
    assert_eq!(reply["data"]["code"], 400);
    expect_closed(&mut ws).await;
}

// =========================================================================
// Rooms and messages
// =========================================================================

#[tokio::test]
async fn test_join_room_existing_member_hears_user_joined_once() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, _) = login(&server, "bob").await;

    join_room(&mut b, 5).await;
    join_room(&mut a, 5).await;
    join_room(&mut a, 5).await;

    assert_eq!(
        settle(&mut b).await,
        vec![json!({"event": "userJoined", "data": {"id": a_id, "username": "alice"}})]
    );
}

#[tokio::test]
async fn test_send_message_reaches_every_member_including_sender() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, _) = login(&server, "bob").await;
    let (mut outsider, _) = login(&server, "carol").await;
    join_room(&mut a, 5).await;
    join_room(&mut b, 5).await;
    settle(&mut a).await;

    send_json(&mut a, json!({"event": "sendMessage", "data": {"content": "hi", "roomId": 5}})).await;

    for ws in [&mut a, &mut b] {
        let msg = next_event(ws).await;
        assert_eq!(msg["event"], "message");
        assert_eq!(msg["data"]["content"], "hi");
        assert_eq!(msg["data"]["roomId"], 5);
        assert_eq!(msg["data"]["userId"], a_id);
        assert_eq!(msg["data"]["username"], "alice");
        assert_eq!(msg["data"]["id"], 1);
        assert!(msg["data"]["createdAt"].is_string());
    }
    assert!(settle(&mut outsider).await.is_empty());
    assert_eq!(server.store.messages().await.len(), 1);
}

#[tokio::test]
async fn test_send_message_order_is_preserved() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;
    let (mut b, _) = login(&server, "bob").await;
    join_room(&mut b, 5).await;
    join_room(&mut a, 5).await;
    settle(&mut b).await;

    for text in ["one", "two", "three"] {
        send_json(&mut a, json!({"event": "sendMessage", "data": {"content": text, "roomId": 5}}))
            .await;
    }

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(next_event(&mut b).await["data"]["content"].clone());
    }
    assert_eq!(seen, vec![json!("one"), json!("two"), json!("three")]);
}

#[tokio::test]
async fn test_join_other_room_old_room_hears_user_left() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, _) = login(&server, "bob").await;
    join_room(&mut b, 5).await;
    join_room(&mut a, 5).await;
    settle(&mut b).await;

    join_room(&mut a, 6).await;

    assert_eq!(
        settle(&mut b).await,
        vec![json!({"event": "userLeft", "data": a_id})]
    );

    // No longer in room 5: b's messages don't reach a.
    send_json(&mut b, json!({"event": "sendMessage", "data": {"content": "gone?", "roomId": 5}})).await;
    assert_eq!(next_event(&mut b).await["event"], "message");
    assert!(settle(&mut a).await.is_empty());
}

#[tokio::test]
async fn test_leave_room_remaining_member_hears_user_left() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, _) = login(&server, "bob").await;
    join_room(&mut b, 5).await;
    join_room(&mut a, 5).await;
    settle(&mut b).await;

    send_json(&mut a, json!({"event": "leaveRoom", "data": 5})).await;
    settle(&mut a).await;

    assert_eq!(
        settle(&mut b).await,
        vec![json!({"event": "userLeft", "data": a_id})]
    );
}

#[tokio::test]
async fn test_send_message_store_down_is_dropped() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;
    join_room(&mut a, 5).await;

    server.store.set_available(false);
    send_json(&mut a, json!({"event": "sendMessage", "data": {"content": "lost", "roomId": 5}})).await;
    assert!(settle(&mut a).await.is_empty());

    server.store.set_available(true);
    send_json(&mut a, json!({"event": "sendMessage", "data": {"content": "kept", "roomId": 5}})).await;
    assert_eq!(next_event(&mut a).await["data"]["content"], "kept");
}

// =========================================================================
// Private messages
// =========================================================================

#[tokio::test]
async fn test_private_message_reaches_both_parties_only() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    let (mut c, _) = login(&server, "carol").await;

    send_json(
        &mut a,
        json!({"event": "sendPrivateMessage", "data": {"content": "psst", "recipientId": b_id}}),
    )
    .await;

    for ws in [&mut a, &mut b] {
        let msg = next_event(ws).await;
        assert_eq!(msg["event"], "privateMessage");
        assert_eq!(msg["data"]["content"], "psst");
        assert_eq!(msg["data"]["userId"], a_id);
        assert_eq!(msg["data"]["recipientId"], b_id);
    }
    assert!(settle(&mut c).await.is_empty());
}

#[tokio::test]
async fn test_private_message_reply_uses_same_channel() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    send_json(
        &mut a,
        json!({"event": "sendPrivateMessage", "data": {"content": "hi bob", "recipientId": b_id}}),
    )
    .await;
    next_event(&mut a).await;
    next_event(&mut b).await;

    send_json(
        &mut b,
        json!({"event": "sendPrivateMessage", "data": {"content": "hi alice", "recipientId": 1}}),
    )
    .await;

    // Exactly one copy each: both sides are in one channel, not two.
    assert_eq!(next_event(&mut a).await["data"]["content"], "hi alice");
    assert_eq!(next_event(&mut b).await["data"]["content"], "hi alice");
    assert!(settle(&mut a).await.is_empty());
    assert!(settle(&mut b).await.is_empty());
}

#[tokio::test]
async fn test_private_message_offline_recipient_echoes_to_sender() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;

    send_json(
        &mut a,
        json!({"event": "sendPrivateMessage", "data": {"content": "later", "recipientId": 42}}),
    )
    .await;

    let echo = next_event(&mut a).await;
    assert_eq!(echo["event"], "privateMessage");
    assert_eq!(echo["data"]["recipientId"], 42);
    assert_eq!(server.store.messages().await.len(), 1);
}

#[tokio::test]
async fn test_private_channel_survives_public_room_switch() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    send_json(
        &mut a,
        json!({"event": "sendPrivateMessage", "data": {"content": "one", "recipientId": b_id}}),
    )
    .await;
    next_event(&mut a).await;
    next_event(&mut b).await;

    join_room(&mut b, 5).await;
    join_room(&mut b, 6).await;

    send_json(&mut a, json!({"event": "sendPrivateMessage", "data": {"content": "two", "recipientId": b_id}}))
        .await;
    assert_eq!(next_event(&mut b).await["data"]["content"], "two");
}

// =========================================================================
// Signaling
// =========================================================================

#[tokio::test]
async fn test_webcam_direct_request_accept_only_requester_notified() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;

    send_json(&mut a, json!({"event": "requestWebcam", "data": {"recipientId": b_id}})).await;
    assert_eq!(
        next_event(&mut b).await,
        json!({"event": "webcamRequest", "data": {"userId": a_id, "username": "alice"}})
    );

    send_json(&mut b, json!({"event": "acceptWebcam", "data": a_id})).await;
    assert_eq!(
        next_event(&mut a).await,
        json!({"event": "webcamAccepted", "data": b_id})
    );
    assert!(settle(&mut b).await.is_empty());
}

#[tokio::test]
async fn test_webcam_room_request_reaches_room_except_requester() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, _) = login(&server, "bob").await;
    let (mut c, _) = login(&server, "carol").await;
    join_room(&mut a, 5).await;
    join_room(&mut b, 5).await;
    join_room(&mut c, 5).await;
    settle(&mut a).await;
    settle(&mut b).await;

    send_json(&mut a, json!({"event": "requestWebcam", "data": {"roomId": 5}})).await;

    let expected = json!({
        "event": "webcamRequest",
        "data": {"userId": a_id, "username": "alice", "roomId": 5}
    });
    assert_eq!(next_event(&mut b).await, expected);
    assert_eq!(next_event(&mut c).await, expected);
    assert!(settle(&mut a).await.is_empty());
}

#[tokio::test]
async fn test_webcam_room_request_first_accept_opens_call() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    join_room(&mut a, 5).await;
    join_room(&mut b, 5).await;
    settle(&mut a).await;

    send_json(&mut a, json!({"event": "requestWebcam", "data": {"roomId": 5}})).await;
    next_event(&mut b).await;
    send_json(&mut b, json!({"event": "acceptWebcam", "data": a_id})).await;
    assert_eq!(next_event(&mut a).await["data"], b_id);

    let offer = json!({"type": "offer", "sdp": "v=0"});
    send_json(&mut a, json!({"event": "sendWebcamSignal", "data": {"userId": b_id, "data": offer}})).await;
    assert_eq!(
        next_event(&mut b).await,
        json!({"event": "webcamSignal", "data": {"userId": a_id, "data": offer}})
    );
}

#[tokio::test]
async fn test_webcam_reject_notifies_requester() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;

    send_json(&mut a, json!({"event": "requestWebcam", "data": {"recipientId": b_id}})).await;
    next_event(&mut b).await;
    send_json(&mut b, json!({"event": "rejectWebcam", "data": a_id})).await;

    assert_eq!(
        next_event(&mut a).await,
        json!({"event": "webcamRejected", "data": b_id})
    );

    // Rejected means no call: signals are dropped.
    send_json(&mut a, json!({"event": "sendWebcamSignal", "data": {"userId": b_id, "data": {}}})).await;
    settle(&mut a).await;
    assert!(settle(&mut b).await.is_empty());
}

#[tokio::test]
async fn test_webcam_signal_forwarded_verbatim_both_ways() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    send_json(&mut a, json!({"event": "requestWebcam", "data": {"recipientId": b_id}})).await;
    next_event(&mut b).await;
    send_json(&mut b, json!({"event": "acceptWebcam", "data": a_id})).await;
    next_event(&mut a).await;

    let offer = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 0.0.0.0\r\n"});
    send_json(&mut a, json!({"event": "sendWebcamSignal", "data": {"userId": b_id, "data": offer}})).await;
    assert_eq!(
        next_event(&mut b).await,
        json!({"event": "webcamSignal", "data": {"userId": a_id, "data": offer}})
    );

    let candidate = json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.1 54321 typ host", "sdpMLineIndex": 0});
    send_json(&mut b, json!({"event": "sendWebcamSignal", "data": {"userId": a_id, "data": candidate}})).await;
    assert_eq!(
        next_event(&mut a).await,
        json!({"event": "webcamSignal", "data": {"userId": b_id, "data": candidate}})
    );
}

#[tokio::test]
async fn test_webcam_signal_without_accept_is_dropped() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;

    send_json(&mut a, json!({"event": "sendWebcamSignal", "data": {"userId": b_id, "data": {"sdp": "x"}}})).await;
    settle(&mut a).await;
    assert!(settle(&mut b).await.is_empty());
}

#[tokio::test]
async fn test_end_webcam_notifies_counterpart() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    send_json(&mut a, json!({"event": "requestWebcam", "data": {"recipientId": b_id}})).await;
    next_event(&mut b).await;
    send_json(&mut b, json!({"event": "acceptWebcam", "data": a_id})).await;
    next_event(&mut a).await;

    send_json(&mut b, json!({"event": "endWebcam", "data": a_id})).await;

    assert_eq!(
        next_event(&mut a).await,
        json!({"event": "webcamEnded", "data": b_id})
    );
}

#[tokio::test]
async fn test_unanswered_call_request_times_out() {
    let server = start_server_with(
        ServerConfig {
            sweep_interval: Duration::from_millis(20),
            ..ServerConfig::default()
        },
        CallConfig {
            request_timeout: Some(Duration::from_millis(100)),
        },
    )
    .await;
    let (mut a, _) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;

    send_json(&mut a, json!({"event": "requestWebcam", "data": {"recipientId": b_id}})).await;
    next_event(&mut b).await;

    assert_eq!(
        next_event(&mut a).await,
        json!({"event": "webcamEnded", "data": b_id})
    );
}

#[tokio::test]
async fn test_request_webcam_with_both_targets_is_400_and_closes() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;

    send_json(
        &mut a,
        json!({"event": "requestWebcam", "data": {"roomId": 5, "recipientId": 2}}),
    )
    .await;

    let reply = next_event(&mut a).await;
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["code"], 400);
    expect_closed(&mut a).await;
}

// =========================================================================
// Disconnect and routing
// =========================================================================

#[tokio::test]
async fn test_disconnect_user_left_once_per_room_and_channel() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    join_room(&mut b, 5).await;
    join_room(&mut a, 5).await;
    send_json(
        &mut a,
        json!({"event": "sendPrivateMessage", "data": {"content": "hey", "recipientId": b_id}}),
    )
    .await;
    next_event(&mut a).await;
    settle(&mut b).await;

    a.close(None).await.expect("close");

    let left = json!({"event": "userLeft", "data": a_id});
    assert_eq!(next_event(&mut b).await, left);
    assert_eq!(next_event(&mut b).await, left);
    assert!(settle(&mut b).await.is_empty());
}

#[tokio::test]
async fn test_disconnect_ends_call_for_counterpart() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;
    send_json(&mut a, json!({"event": "requestWebcam", "data": {"recipientId": b_id}})).await;
    next_event(&mut b).await;
    send_json(&mut b, json!({"event": "acceptWebcam", "data": a_id})).await;
    next_event(&mut a).await;

    b.close(None).await.expect("close");

    assert_eq!(
        next_event(&mut a).await,
        json!({"event": "webcamEnded", "data": b_id})
    );
}

#[tokio::test]
async fn test_second_connection_takes_over_routing() {
    let server = start_server().await;
    let (identity, token) = server.store.add_user("alice").await;
    let a_id = identity.id.0;
    let mut a_old = login_with_token(&server, &token, a_id, "alice").await;
    let mut a_new = login_with_token(&server, &token, a_id, "alice").await;
    let (mut b, b_id) = login(&server, "bob").await;

    send_json(&mut b, json!({"event": "requestWebcam", "data": {"recipientId": a_id}})).await;

    assert_eq!(next_event(&mut a_new).await["event"], "webcamRequest");
    assert!(settle(&mut a_old).await.is_empty());

    // The old socket stays open and keeps its own rooms.
    join_room(&mut a_old, 5).await;
    send_json(&mut a_old, json!({"event": "sendMessage", "data": {"content": "still here", "roomId": 5}}))
        .await;
    assert_eq!(next_event(&mut a_old).await["data"]["content"], "still here");

    // Closing the old socket leaves the new one routed and the request
    // pending.
    a_old.close(None).await.expect("close");
    tokio::time::sleep(Duration::from_millis(50)).await;
    send_json(&mut b, json!({"event": "endWebcam", "data": a_id})).await;
    assert_eq!(
        next_event(&mut a_new).await,
        json!({"event": "webcamEnded", "data": b_id})
    );
}

// =========================================================================
// Connection hygiene
// =========================================================================

#[tokio::test]
async fn test_ping_returns_pong_with_client_time() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;

    send_json(&mut a, json!({"event": "ping", "data": {"clientTime": 12345}})).await;

    let pong = next_event(&mut a).await;
    assert_eq!(pong["event"], "pong");
    assert_eq!(pong["data"]["clientTime"], 12345);
    assert!(pong["data"]["serverTime"].as_u64().is_some_and(|t| t > 0));
}

#[tokio::test]
async fn test_malformed_event_is_400_and_closes() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;

    a.send(Message::Text("definitely not json".into()))
        .await
        .expect("send");

    let reply = next_event(&mut a).await;
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["code"], 400);
    expect_closed(&mut a).await;
}

#[tokio::test]
async fn test_malformed_event_queued_events_arrive_before_error() {
    let server = start_server().await;
    let (mut a, _) = login(&server, "alice").await;
    join_room(&mut a, 5).await;

    for text in ["one", "two", "three"] {
        send_json(&mut a, json!({"event": "sendMessage", "data": {"content": text, "roomId": 5}}))
            .await;
    }
    a.send(Message::Text("{oops".into())).await.expect("send");

    for text in ["one", "two", "three"] {
        let msg = next_event(&mut a).await;
        assert_eq!(msg["event"], "message");
        assert_eq!(msg["data"]["content"], text);
    }
    let reply = next_event(&mut a).await;
    assert_eq!(reply["event"], "error");
    assert_eq!(reply["data"]["code"], 400);
    expect_closed(&mut a).await;
}

#[tokio::test]
async fn test_accept_webcam_nobody_requested_unlocks_nothing() {
    let server = start_server().await;
    let (mut a, a_id) = login(&server, "alice").await;
    let (mut b, _) = login(&server, "bob").await;

    send_json(&mut b, json!({"event": "acceptWebcam", "data": a_id})).await;
    send_json(&mut b, json!({"event": "sendWebcamSignal", "data": {"userId": a_id, "data": {"sdp": "x"}}}))
        .await;
    settle(&mut b).await;

    assert!(settle(&mut a).await.is_empty());
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let server = start_server_with(
        ServerConfig {
            idle_timeout: Duration::from_millis(200),
            ..ServerConfig::default()
        },
        CallConfig::default(),
    )
    .await;
    let (mut a, _) = login(&server, "alice").await;

    expect_closed(&mut a).await;
}
