//! Integration tests for the relay server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use roomcast::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its address and a handle.
async fn start_server(liveness: LivenessConfig) -> (String, RelayHandle) {
    let server = RelayServerBuilder::new()
        .bind("127.0.0.1:0")
        .liveness(liveness)
        .build()
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let handle = server.handle();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    (addr, handle)
}

async fn start_quiet_server() -> (String, RelayHandle) {
    start_server(LivenessConfig::disabled()).await
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_json(ws: &mut ClientWs, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("send should succeed");
}

/// Reads the next application message, skipping control frames.
///
/// Returns `None` if the stream ends or `wait` elapses first.
async fn next_json(ws: &mut ClientWs, wait: Duration) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let msg = tokio::time::timeout_at(deadline, ws.next()).await.ok()??;
        match msg {
            Ok(Message::Text(text)) => {
                return Some(serde_json::from_str(&text).expect("server sends JSON"));
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(_) | Err(_) => return None,
        }
    }
}

async fn recv_json(ws: &mut ClientWs) -> Value {
    next_json(ws, Duration::from_secs(2))
        .await
        .expect("expected a message from the server")
}

/// Asserts that no application message arrives for a short while.
async fn expect_silence(ws: &mut ClientWs) {
    if let Some(msg) = next_json(ws, Duration::from_millis(200)).await {
        panic!("expected no message, got {msg}");
    }
}

/// Polls the registry until `check` holds or two seconds pass.
async fn wait_until(handle: &RelayHandle, check: impl Fn(&Registry) -> bool) {
    wait_until_within(handle, Duration::from_secs(2), check).await;
}

async fn wait_until_within(
    handle: &RelayHandle,
    limit: Duration,
    check: impl Fn(&Registry) -> bool,
) {
    let deadline = tokio::time::Instant::now() + limit;
    while !handle.inspect(&check).await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn create(ws: &mut ClientWs, room: &str) {
    send_json(ws, json!({"type": "create", "room": room})).await;
    assert_eq!(recv_json(ws).await, json!({"type": "connected"}));
}

async fn join(ws: &mut ClientWs, room: &str) {
    send_json(ws, json!({"type": "join", "room": room})).await;
    assert_eq!(recv_json(ws).await, json!({"type": "connected"}));
}

async fn transcript(ws: &mut ClientWs, text: &str) {
    send_json(ws, json!({"type": "transcript", "text": text})).await;
}

// =========================================================================
// Room operations
// =========================================================================

#[tokio::test]
async fn test_create_acknowledges_and_registers_room() {
    let (addr, handle) = start_quiet_server().await;
    let mut ws = connect(&addr).await;

    create(&mut ws, "standup").await;

    assert_eq!(handle.room_count().await, 1);
    assert_eq!(handle.member_count("standup").await, 1);
    assert_eq!(handle.room_ids().await, vec![RoomId::new("standup")]);
}

#[tokio::test]
async fn test_join_missing_room_is_silent() {
    let (addr, handle) = start_quiet_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({"type": "join", "room": "nowhere"})).await;
    expect_silence(&mut ws).await;

    assert_eq!(handle.room_count().await, 0);

    // The connection is still usable afterwards.
    create(&mut ws, "somewhere").await;
}

#[tokio::test]
async fn test_transcript_reaches_others_but_not_sender() {
    let (addr, _handle) = start_quiet_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let mut c = connect(&addr).await;

    create(&mut a, "x").await;
    join(&mut b, "x").await;
    join(&mut c, "x").await;

    transcript(&mut a, "hello").await;

    let expected = json!({"type": "transcript", "text": "hello"});
    assert_eq!(recv_json(&mut b).await, expected);
    assert_eq!(recv_json(&mut c).await, expected);
    expect_silence(&mut a).await;
}

#[tokio::test]
async fn test_transcript_does_not_cross_rooms() {
    let (addr, _handle) = start_quiet_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let mut other = connect(&addr).await;

    create(&mut a, "x").await;
    join(&mut b, "x").await;
    create(&mut other, "y").await;

    transcript(&mut a, "only for x").await;

    assert_eq!(
        recv_json(&mut b).await,
        json!({"type": "transcript", "text": "only for x"})
    );
    expect_silence(&mut other).await;
}

#[tokio::test]
async fn test_transcript_without_room_is_ignored() {
    let (addr, _handle) = start_quiet_server().await;
    let mut a = connect(&addr).await;

    transcript(&mut a, "into the void").await;
    expect_silence(&mut a).await;

    create(&mut a, "x").await;
}

#[tokio::test]
async fn test_end_to_end_membership_lifecycle() {
    let (addr, handle) = start_quiet_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    let mut c = connect(&addr).await;

    create(&mut a, "x").await;
    join(&mut b, "x").await;
    transcript(&mut a, "hi").await;
    assert_eq!(
        recv_json(&mut b).await,
        json!({"type": "transcript", "text": "hi"})
    );

    // C tries a room that doesn't exist: no ack, no state change.
    send_json(&mut c, json!({"type": "join", "room": "y"})).await;
    expect_silence(&mut c).await;
    assert!(!handle.room_ids().await.contains(&RoomId::new("y")));

    b.close(None).await.expect("close");
    wait_until(&handle, |reg| reg.member_count("x") == 1).await;
    assert_eq!(handle.room_count().await, 1);

    a.close(None).await.expect("close");
    wait_until(&handle, |reg| reg.room_count() == 0).await;
    assert!(handle.room_ids().await.is_empty());
}

#[tokio::test]
async fn test_recreating_room_joins_it() {
    let (addr, handle) = start_quiet_server().await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;

    create(&mut a, "x").await;
    create(&mut b, "x").await;

    assert_eq!(handle.room_count().await, 1);
    assert_eq!(handle.member_count("x").await, 2);

    transcript(&mut b, "same room").await;
    assert_eq!(
        recv_json(&mut a).await,
        json!({"type": "transcript", "text": "same room"})
    );
}

// =========================================================================
// Robustness
// =========================================================================

#[tokio::test]
async fn test_malformed_payloads_keep_connection_open() {
    let (addr, handle) = start_quiet_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::text("not json at all")).await.expect("send");
    send_json(&mut ws, json!({"type": "create"})).await;
    send_json(&mut ws, json!({"room": "x"})).await;
    expect_silence(&mut ws).await;

    assert_eq!(handle.connection_count().await, 1);
    create(&mut ws, "x").await;
}

#[tokio::test]
async fn test_unknown_message_type_is_ignored() {
    let (addr, _handle) = start_quiet_server().await;
    let mut ws = connect(&addr).await;

    send_json(&mut ws, json!({"type": "dance", "room": "x"})).await;
    expect_silence(&mut ws).await;

    create(&mut ws, "x").await;
}

#[tokio::test]
async fn test_binary_frames_are_decoded_like_text() {
    let (addr, _handle) = start_quiet_server().await;
    let mut ws = connect(&addr).await;

    let payload = json!({"type": "create", "room": "x"}).to_string();
    ws.send(Message::Binary(payload.into_bytes().into()))
        .await
        .expect("send");
    assert_eq!(recv_json(&mut ws).await, json!({"type": "connected"}));
}

#[tokio::test]
async fn test_disconnect_without_room_is_clean() {
    let (addr, handle) = start_quiet_server().await;
    let mut ws = connect(&addr).await;

    wait_until(&handle, |reg| reg.connection_count() == 1).await;
    ws.close(None).await.expect("close");
    wait_until(&handle, |reg| reg.connection_count() == 0).await;
    assert_eq!(handle.room_count().await, 0);
}

// =========================================================================
// Liveness
// =========================================================================

#[tokio::test]
async fn test_silent_client_is_terminated() {
    let (addr, handle) =
        start_server(LivenessConfig::with_interval(Duration::from_millis(100))).await;
    let mut responsive = connect(&addr).await;
    let mut silent = connect(&addr).await;

    create(&mut responsive, "x").await;
    join(&mut silent, "x").await;
    assert_eq!(handle.member_count("x").await, 2);

    // Reading keeps answering probes; `silent` is never polled again, so
    // its probes go unanswered.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while handle.member_count("x").await != 1 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "silent client was not terminated"
        );
        let _ = next_json(&mut responsive, Duration::from_millis(50)).await;
    }

    assert_eq!(handle.connection_count().await, 1);
    assert_eq!(handle.room_count().await, 1);

    // The survivor stays connected through further sweeps.
    let _ = next_json(&mut responsive, Duration::from_millis(400)).await;
    assert_eq!(handle.member_count("x").await, 1);
    create(&mut responsive, "x").await;

    drop(silent);
}

#[tokio::test]
async fn test_termination_drops_socket_stuck_on_a_full_write() {
    const TRANSCRIPTS: usize = 200;

    let (addr, handle) =
        start_server(LivenessConfig::with_interval(Duration::from_millis(500))).await;
    let mut stalled = connect(&addr).await;
    create(&mut stalled, "x").await;

    let (mut talker_tx, mut talker_rx) = connect(&addr).await.split();
    talker_tx
        .send(Message::text(json!({"type": "join", "room": "x"}).to_string()))
        .await
        .expect("send");
    // Draining keeps the talker answering probes.
    let reader = tokio::spawn(async move { while let Some(Ok(_)) = talker_rx.next().await {} });
    wait_until(&handle, |reg| reg.member_count("x") == 2).await;

    // 256 KiB per transcript, far more in total than the socket buffers
    // between the relay and `stalled` can hold.
    let payload = json!({"type": "transcript", "text": "a".repeat(256 * 1024)}).to_string();
    let flood = tokio::spawn(async move {
        for _ in 0..TRANSCRIPTS {
            if talker_tx.send(Message::text(payload.clone())).await.is_err() {
                break;
            }
        }
        talker_tx
    });

    wait_until_within(&handle, Duration::from_secs(10), |reg| {
        reg.member_count("x") == 1 && reg.connection_count() == 1
    })
    .await;

    // The relay must have dropped the socket instead of finishing the
    // backlog: reading now yields what was buffered, then the stream ends.
    let received = tokio::time::timeout(Duration::from_secs(10), async {
        let mut transcripts = 0;
        loop {
            match stalled.next().await {
                Some(Ok(Message::Text(_))) => transcripts += 1,
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => break transcripts,
            }
        }
    })
    .await
    .expect("terminated socket should be closed by the relay");
    assert!(
        received < TRANSCRIPTS,
        "relay kept writing to a terminated peer ({received} of {TRANSCRIPTS})"
    );

    flood.abort();
    reader.abort();
}

#[tokio::test]
async fn test_disabled_liveness_never_terminates() {
    let (addr, handle) = start_quiet_server().await;
    let mut silent = connect(&addr).await;
    create(&mut silent, "x").await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(handle.member_count("x").await, 1);
}

// =========================================================================
// Shutdown
// =========================================================================

#[tokio::test]
async fn test_shutdown_stops_run_and_closes_clients() {
    let server = RelayServerBuilder::new()
        .bind("127.0.0.1:0")
        .liveness_interval(Duration::from_millis(50))
        .build()
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("addr").to_string();
    let handle = server.handle();
    let task = tokio::spawn(server.run());

    let mut ws = connect(&addr).await;
    create(&mut ws, "x").await;

    assert!(!handle.is_shut_down());
    handle.shutdown();
    assert!(handle.is_shut_down());

    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("run should return after shutdown")
        .expect("server task should not panic");
    assert!(result.is_ok());

    assert!(next_json(&mut ws, Duration::from_secs(1)).await.is_none());
}

#[tokio::test]
async fn test_run_until_returns_when_signal_fires() {
    let server = RelayServerBuilder::new()
        .bind("127.0.0.1:0")
        .liveness(LivenessConfig::disabled())
        .build()
        .await
        .expect("server should build");
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let task = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));

    tx.send(()).expect("server is waiting");
    let result = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("run_until should return")
        .expect("server task should not panic");
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_inspect_reads_registry() {
    let (addr, handle) = start_quiet_server().await;
    let mut a = connect(&addr).await;
    create(&mut a, "x").await;

    let members = handle.inspect(|reg| reg.members("x")).await;
    assert_eq!(members.len(), 1);
    let current = handle
        .inspect(|reg| reg.current_room(members[0]).cloned())
        .await;
    assert_eq!(current, Some(RoomId::new("x")));
}
