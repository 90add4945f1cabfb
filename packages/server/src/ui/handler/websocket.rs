//! WebSocket connection handlers.
//!
//! ## 設計ノート
//!
//! 入室審査はアップグレード前に行います。審査に落ちた要求はハンドシェイクを
//! 完了させずに 404（ストア障害時は 503）で拒否されます。
//!
//! アップグレード後は 1 接続につき 3 タスクが並行して動きます。
//! - writer: 送信キューをソケットに書き出す唯一のタスク
//! - inbound: 受信フレームのデコードと振り分け
//! - liveness: keepalive の送信と無通信の検知
//!
//! inbound か liveness のどちらかが終わった時点で切断処理を行い、
//! Close フレームの送出を一定時間だけ待ってから writer を止めます。

use std::{fmt::Display, sync::Arc};

use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio::task::JoinError;

use crate::{
    domain::{MeetingId, ParticipantIdentity, Username},
    infrastructure::{
        Connection, LivenessOutcome, dto::websocket::ClientEnvelope, liveness, spawn_writer,
    },
    ui::state::AppState,
    usecase::{ConnectError, HandleMessageUseCase},
};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    #[serde(default)]
    pub username: String,
}

/// Why the inbound loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundEnd {
    /// The client sent a close frame
    ClientClosed,
    /// The stream ended without a close frame
    StreamEnded,
    /// A frame could not be decoded
    Malformed,
    /// Reading from the transport failed
    TransportError,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
    Query(query): Query<ConnectQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    // Convert String -> Domain Model
    let meeting_id = MeetingId::new(room_id).map_err(|e| {
        tracing::warn!("Rejecting connection: invalid room id: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    let username = Username::new(query.username).map_err(|e| {
        tracing::warn!("Rejecting connection to '{}': {}", meeting_id, e);
        StatusCode::BAD_REQUEST
    })?;

    match state
        .connect_participant_usecase
        .admit(&meeting_id, username)
        .await
    {
        Ok(identity) => Ok(ws.on_upgrade(move |socket| {
            handle_socket(socket, state, meeting_id, identity)
        })),
        Err(e @ ConnectError::IdentityNotFound { .. }) => {
            tracing::warn!("Rejecting connection: {}", e);
            Err(StatusCode::NOT_FOUND)
        }
        Err(e @ ConnectError::StoreUnavailable(_)) => {
            tracing::error!("Rejecting connection to '{}': {}", meeting_id, e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    meeting_id: MeetingId,
    identity: ParticipantIdentity,
) {
    let settings = state.settings;
    let (connection, outbound) =
        Connection::new(meeting_id, identity, settings.outbound_capacity);
    let connection = Arc::new(connection);

    let (sink, stream) = socket.split();
    let mut writer = spawn_writer(outbound, sink);
    let mut writer_done = false;

    if state
        .connect_participant_usecase
        .activate(&connection)
        .await
        .is_some()
    {
        let mut recv_task = tokio::spawn(inbound_loop(
            stream,
            connection.clone(),
            state.handle_message_usecase.clone(),
        ));
        let mut liveness_task =
            tokio::spawn(liveness::supervise(connection.clone(), settings.liveness));

        // If any one of the tasks completes, abort the others
        tokio::select! {
            result = &mut recv_task => {
                liveness_task.abort();
                log_inbound_end(&connection, result);
            }
            result = &mut liveness_task => {
                recv_task.abort();
                match result {
                    Ok(LivenessOutcome::Expired) => tracing::info!(
                        "'{}' in '{}' timed out",
                        connection.identity().username,
                        connection.meeting_id()
                    ),
                    Ok(LivenessOutcome::Closed) => tracing::debug!(
                        "'{}' in '{}' was closed",
                        connection.identity().username,
                        connection.meeting_id()
                    ),
                    Err(e) => log_task_failure(&connection, "liveness", e),
                }
            }
            result = &mut writer => {
                writer_done = true;
                recv_task.abort();
                liveness_task.abort();
                if let Err(e) = result {
                    log_task_failure(&connection, "writer", e);
                }
            }
        }
    }

    // 切断処理（Close フレームもここで積まれる）
    state
        .disconnect_participant_usecase
        .execute(&connection)
        .await;

    if !writer_done
        && tokio::time::timeout(settings.close_grace, &mut writer)
            .await
            .is_err()
    {
        tracing::debug!(
            "Close frame for '{}' not flushed in time",
            connection.identity().username
        );
        writer.abort();
    }
}

fn log_inbound_end(connection: &Connection, result: Result<InboundEnd, JoinError>) {
    let username = &connection.identity().username;
    match result {
        Ok(InboundEnd::ClientClosed) => tracing::info!("'{}' requested close", username),
        Ok(InboundEnd::StreamEnded) => tracing::info!("'{}' disconnected", username),
        Ok(InboundEnd::Malformed) => {
            tracing::warn!("'{}' sent a malformed envelope, closing", username)
        }
        Ok(InboundEnd::TransportError) => {
            tracing::warn!("'{}' connection failed, closing", username)
        }
        Err(e) => log_task_failure(connection, "inbound", e),
    }
}

fn log_task_failure(connection: &Connection, task: &str, error: JoinError) {
    if error.is_panic() {
        tracing::error!(
            "{} task for '{}' in '{}' panicked; cleaning up",
            task,
            connection.identity().username,
            connection.meeting_id()
        );
    } else {
        tracing::debug!(
            "{} task for '{}' cancelled",
            task,
            connection.identity().username
        );
    }
}

/// Read inbound frames until the client goes away or sends something
/// undecodable. Every frame refreshes the liveness window.
pub async fn inbound_loop<S, E>(
    mut stream: S,
    connection: Arc<Connection>,
    handler: Arc<HandleMessageUseCase>,
) -> InboundEnd
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!("WebSocket read failed: {}", e);
                return InboundEnd::TransportError;
            }
        };
        connection.touch();

        let decoded = match &frame {
            Message::Text(text) => ClientEnvelope::decode(text.as_str().as_bytes()),
            Message::Binary(bytes) => ClientEnvelope::decode(bytes),
            // 制御フレーム（ping への pong は axum が返す）
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return InboundEnd::ClientClosed,
        };

        match decoded {
            Ok(envelope) => {
                tracing::debug!(
                    "Received envelope from '{}': {:?}",
                    connection.identity().username,
                    envelope
                );
                handler.execute(&connection, envelope).await;
            }
            Err(e) => {
                tracing::warn!("Dropping '{}': {}", connection.identity().username, e);
                return InboundEnd::Malformed;
            }
        }
    }
    InboundEnd::StreamEnded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{
        BroadcastHub, ConnectionRegistry,
        connection::test_support::{create_test_connection, drain_json},
    };
    use axum::body::Bytes;
    use futures_util::stream;
    use kaigi_shared::time::FixedClock;
    use serde_json::json;
    use std::convert::Infallible;
    use tokio::time::Duration;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - inbound_loop のフレーム種別ごとの扱い
    // - 不正なフレームで終了すること、Close フレームで終了すること
    // - 受信のたびに生存確認の時刻が更新されること
    // ========================================

    async fn create_handler() -> (Arc<ConnectionRegistry>, Arc<HandleMessageUseCase>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = Arc::new(BroadcastHub::new(registry.clone()));
        let handler = Arc::new(HandleMessageUseCase::new(
            hub,
            Arc::new(FixedClock::from_unix_seconds(1_700_000_000)),
        ));
        (registry, handler)
    }

    fn text(value: &str) -> Result<Message, Infallible> {
        Ok(Message::Text(value.to_string().into()))
    }

    #[tokio::test]
    async fn test_inbound_dispatches_until_stream_ends() {
        // テスト項目: テキスト・バイナリの両方がデコードされ、終端で StreamEnded になる
        // given (前提条件):
        let (registry, handler) = create_handler().await;
        let (connection, mut rx) = create_test_connection("R1", "alice", "s1", 8);
        let connection = Arc::new(connection);
        registry.register(connection.clone()).await;
        let frames = stream::iter(vec![
            text(r#"{"type":"ping"}"#),
            Ok(Message::Ping(Bytes::new())),
            Ok(Message::Binary(Bytes::from_static(br#"{"type":"ping"}"#))),
            text(r#"{"type":"chat","payload":{"text":"hi"}}"#),
        ]);

        // when (操作):
        let end = inbound_loop(frames, connection, handler).await;

        // then (期待する結果):
        assert_eq!(end, InboundEnd::StreamEnded);
        assert_eq!(
            drain_json(&mut rx),
            vec![json!({"type": "pong"}), json!({"type": "pong"})]
        );
    }

    #[tokio::test]
    async fn test_inbound_stops_on_malformed_frame() {
        // テスト項目: デコードできないフレームで終了し、後続は処理されない
        // given (前提条件):
        let (_registry, handler) = create_handler().await;
        let (connection, mut rx) = create_test_connection("R1", "alice", "s1", 8);
        let frames = stream::iter(vec![text("{not json"), text(r#"{"type":"ping"}"#)]);

        // when (操作):
        let end = inbound_loop(frames, Arc::new(connection), handler).await;

        // then (期待する結果):
        assert_eq!(end, InboundEnd::Malformed);
        assert!(drain_json(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_inbound_stops_on_close_frame() {
        // テスト項目: Close フレームで ClientClosed になる
        // given (前提条件):
        let (_registry, handler) = create_handler().await;
        let (connection, _rx) = create_test_connection("R1", "alice", "s1", 8);
        let frames = stream::iter(vec![Ok(Message::Close(None)), text(r#"{"type":"ping"}"#)]);

        // when (操作):
        let end = inbound_loop(frames, Arc::new(connection), handler).await;

        // then (期待する結果):
        assert_eq!(end, InboundEnd::ClientClosed);
    }

    #[tokio::test]
    async fn test_inbound_transport_error() {
        // テスト項目: 読み取りエラーで TransportError になる
        // given (前提条件):
        let (_registry, handler) = create_handler().await;
        let (connection, _rx) = create_test_connection("R1", "alice", "s1", 8);
        let frames = stream::iter(vec![Err::<Message, _>("connection reset")]);

        // when (操作):
        let end = inbound_loop(frames, Arc::new(connection), handler).await;

        // then (期待する結果):
        assert_eq!(end, InboundEnd::TransportError);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inbound_frames_refresh_liveness() {
        // テスト項目: 受信フレーム（Pong 含む）で最終受信時刻が更新される
        // given (前提条件):
        let (_registry, handler) = create_handler().await;
        let (connection, _rx) = create_test_connection("R1", "alice", "s1", 8);
        let connection = Arc::new(connection);
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(connection.idle_for(), Duration::from_secs(50));
        let frames = stream::iter(vec![Ok::<_, Infallible>(Message::Pong(Bytes::new()))]);

        // when (操作):
        inbound_loop(frames, connection.clone(), handler).await;

        // then (期待する結果):
        assert_eq!(connection.idle_for(), Duration::ZERO);
    }
}
