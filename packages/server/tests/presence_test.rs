//! End-to-end tests: a real server on an ephemeral port, driven by
//! WebSocket clients and HTTP calls.

mod common;

use std::time::Duration;

use common::{TestServer, next_json, next_of_type, send_json, try_next_json};
use futures_util::SinkExt;
use serde_json::{Value, json};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};

#[tokio::test]
async fn test_join_speak_and_silent_leave_scenario() {
    // テスト項目: 入室 → 通知 → 発話状態の転送 → 無通信による退出、の一連の流れ
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    server.seed_session("R1", "bob", "s2").await;

    // when (操作): alice が入室
    let (mut alice, room_state) = server.join("R1", "alice").await;

    // then (期待する結果): alice には現在のルーム文書が届く
    assert_eq!(room_state["payload"]["room_id"], "R1");
    assert_eq!(room_state["payload"]["sessions"].as_array().unwrap().len(), 2);

    // when (操作): bob が入室
    let (mut bob, _) = server.join("R1", "bob").await;

    // then (期待する結果): alice に participant_joined が届く
    assert_eq!(
        next_json(&mut alice).await,
        json!({
            "type": "participant_joined",
            "payload": {"session_id": "s2", "username": "bob", "tracks": null}
        })
    );

    // when (操作): bob が発話状態を送る
    send_json(
        &mut bob,
        json!({"type": "speaking_state", "payload": {"username": "bob", "isSpeaking": true}}),
    )
    .await;

    // then (期待する結果): alice にそのまま届く
    assert_eq!(
        next_json(&mut alice).await,
        json!({"type": "speaking_state", "payload": {"username": "bob", "isSpeaking": true}})
    );

    // when (操作): bob が応答しなくなる（ソケットは開いたまま読まない）
    // then (期待する結果): 生存確認の期限切れ後、alice に participant_left が届く
    let left = next_of_type(&mut alice, "participant_left").await;
    assert_eq!(left, json!({"type": "participant_left", "payload": {"username": "bob"}}));

    // ストアからも bob のセッションが消えている
    let info: Value = server.get("/meetings/R1/info").await.json().await.unwrap();
    let usernames: Vec<&str> = info["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["username"].as_str().unwrap())
        .collect();
    assert_eq!(usernames, vec!["alice"]);
    drop(bob);
}

#[tokio::test]
async fn test_closed_socket_triggers_single_left() {
    // テスト項目: クライアントが切断すると残りの参加者に participant_left が 1 回だけ届く
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    server.seed_session("R1", "bob", "s2").await;
    let (mut alice, _) = server.join("R1", "alice").await;
    let (mut bob, _) = server.join("R1", "bob").await;
    next_of_type(&mut alice, "participant_joined").await;

    // when (操作):
    bob.close(None).await.unwrap();
    drop(bob);

    // then (期待する結果):
    let left = next_of_type(&mut alice, "participant_left").await;
    assert_eq!(left["payload"], json!({"username": "bob"}));

    // 以降に participant_left は届かない（room_updated は届きうる）
    while let Some(envelope) = try_next_json(&mut alice, Duration::from_millis(400)).await {
        assert_ne!(envelope["type"], "participant_left");
    }
}

#[tokio::test]
async fn test_ping_yields_pong_to_sender_only() {
    // テスト項目: ping には本人にだけ pong が 1 件返る
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    server.seed_session("R1", "bob", "s2").await;
    let (mut alice, _) = server.join("R1", "alice").await;
    let (mut bob, _) = server.join("R1", "bob").await;
    next_of_type(&mut alice, "participant_joined").await;

    // when (操作):
    send_json(&mut alice, json!({"type": "ping"})).await;

    // then (期待する結果):
    assert_eq!(next_json(&mut alice).await, json!({"type": "pong"}));
    assert_eq!(try_next_json(&mut bob, Duration::from_millis(300)).await, None);
}

#[tokio::test]
async fn test_wave_timestamp_is_assigned_by_server() {
    // テスト項目: wave のユーザー名とタイムスタンプはサーバーが付与する
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    server.seed_session("R1", "bob", "s2").await;
    let (mut alice, _) = server.join("R1", "alice").await;
    let (mut bob, _) = server.join("R1", "bob").await;
    next_of_type(&mut alice, "participant_joined").await;

    // when (操作): alice が偽の名前と時刻を付けて wave を送る
    send_json(
        &mut alice,
        json!({
            "type": "wave",
            "payload": {"username": "mallory", "timestamp": "1999-01-01T00:00:00Z"}
        }),
    )
    .await;

    // then (期待する結果):
    let wave = next_of_type(&mut bob, "wave").await;
    assert_eq!(wave["payload"]["username"], "alice");
    let timestamp = wave["payload"]["timestamp"].as_str().unwrap();
    assert_ne!(timestamp, "1999-01-01T00:00:00Z");
    let parsed = chrono::DateTime::parse_from_rfc3339(timestamp).unwrap();
    assert!((chrono::Utc::now() - parsed.with_timezone(&chrono::Utc)).num_seconds().abs() < 60);
}

#[tokio::test]
async fn test_malformed_envelope_disconnects_sender() {
    // テスト項目: デコードできないエンベロープを送った参加者は切断され、退出が通知される
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    server.seed_session("R1", "bob", "s2").await;
    let (mut alice, _) = server.join("R1", "alice").await;
    let (mut bob, _) = server.join("R1", "bob").await;
    next_of_type(&mut alice, "participant_joined").await;

    // when (操作):
    bob.send(Message::text("{not json")).await.unwrap();

    // then (期待する結果):
    let left = next_of_type(&mut alice, "participant_left").await;
    assert_eq!(left["payload"]["username"], "bob");
}

#[tokio::test]
async fn test_tracks_ready_over_http() {
    // テスト項目: HTTP の tracks-ready 通知が接続中の参加者に届き、ルームがなくても成功する
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    server.seed_session("R1", "bob", "s2").await;
    let (mut bob, _) = server.join("R1", "bob").await;

    // when (操作):
    let response = server
        .post(
            "/meetings/R1/notify-tracks-ready",
            json!({"session_id": "s1", "username": "alice"}),
        )
        .await;
    let absent = server
        .post(
            "/meetings/R9/notify-tracks-ready",
            json!({"session_id": "s1", "username": "alice"}),
        )
        .await;

    // then (期待する結果):
    assert_eq!(response.status(), 200);
    assert_eq!(absent.status(), 200);
    assert_eq!(
        next_of_type(&mut bob, "tracks_ready").await,
        json!({"type": "tracks_ready", "payload": {"session_id": "s1", "username": "alice"}})
    );
}

#[tokio::test]
async fn test_leave_over_http() {
    // テスト項目: HTTP の leave でセッションが削除され、session_id 付きで通知される
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    server.seed_session("R1", "bob", "s2").await;
    let (mut alice, _) = server.join("R1", "alice").await;

    // when (操作):
    let first = server
        .post("/meetings/R1/leave", json!({"session_id": "s2"}))
        .await;
    let second = server
        .post("/meetings/R1/leave", json!({"session_id": "s2"}))
        .await;

    // then (期待する結果):
    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 404);
    assert_eq!(
        next_of_type(&mut alice, "participant_left").await,
        json!({"type": "participant_left", "payload": {"username": "bob", "session_id": "s2"}})
    );
}

#[tokio::test]
async fn test_store_update_reaches_room_as_room_updated() {
    // テスト項目: ストアへの書き込みが room_updated として接続中の参加者に届く
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    let (mut alice, _) = server.join("R1", "alice").await;

    // when (操作):
    server.seed_session("R1", "carol", "s3").await;

    // then (期待する結果):
    let updated = next_of_type(&mut alice, "room_updated").await;
    let sessions = updated["payload"]["sessions"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1]["username"], "carol");
}

#[tokio::test]
async fn test_admission_is_rejected_before_upgrade() {
    // テスト項目: 入室審査に落ちた接続はアップグレード前に拒否される
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;

    // when (操作):
    let unknown_user = connect_async(server.ws_url("R1", "mallory")).await;
    let unknown_room = connect_async(server.ws_url("R9", "alice")).await;
    let empty_name = connect_async(server.ws_url("R1", "")).await;

    // then (期待する結果):
    for (result, expected) in [(unknown_user, 404), (unknown_room, 404), (empty_name, 400)] {
        match result {
            Err(WsError::Http(response)) => assert_eq!(response.status(), expected),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connection should have been rejected"),
        }
    }
    let rooms: Value = server.get("/debug/rooms").await.json().await.unwrap();
    assert_eq!(rooms, json!([]));
}

#[tokio::test]
async fn test_debug_rooms_and_health() {
    // テスト項目: ヘルスチェックと、接続中ルームの一覧
    // given (前提条件):
    let server = TestServer::start().await;
    server.seed_session("R1", "alice", "s1").await;
    let (_alice, _) = server.join("R1", "alice").await;

    // when (操作):
    let health: Value = server.get("/api/health").await.json().await.unwrap();
    let rooms: Value = server.get("/debug/rooms").await.json().await.unwrap();
    let missing = server.get("/meetings/R9/info").await;

    // then (期待する結果):
    assert_eq!(health, json!({"status": "ok"}));
    assert_eq!(
        rooms,
        json!([{"room_id": "R1", "participants": [{"username": "alice", "session_id": "s1"}]}])
    );
    assert_eq!(missing.status(), 404);
}
