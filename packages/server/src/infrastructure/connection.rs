//! 参加者 1 人分のライブ接続と、直列化された送信経路
//!
//! ## 責務
//!
//! - 送信キュー（有界）への投入と、キューをソケットに書き出す writer タスク
//! - 最終受信時刻（生存確認）と接続ライフサイクルの状態管理
//!
//! ## 設計ノート
//!
//! 送信元（メッセージ処理、生存確認、ブロードキャスト、変更フィード）はすべて
//! [`Connection::send`] を通り、キューに積むだけです。キューを読むのは
//! [`spawn_writer`] の 1 タスクだけなので、フレームが混ざることはなく、
//! 送信元ごとの順序はそのまま保たれます。
//!
//! キューが満杯の場合は送信元を待たせず、接続を閉じた扱いにして
//! その接続自身の切断処理に任せます。

use std::{
    fmt::Display,
    sync::{Mutex, PoisonError},
};

use axum::{
    body::Bytes,
    extract::ws::{CloseFrame, Message, Utf8Bytes, close_code},
};
use futures_util::{Sink, SinkExt};
use tokio::{
    sync::{
        mpsc::{self, error::TrySendError},
        watch,
    },
    task::JoinHandle,
    time::{Duration, Instant},
};

use crate::{
    domain::{
        ConnectionId, ConnectionState, LifecycleEvent, MeetingId, ParticipantIdentity, PushError,
    },
    infrastructure::dto::websocket::ServerEnvelope,
};

/// Default capacity of a connection's outbound queue
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Item on a connection's outbound queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Serialized envelope
    Text(String),
    /// WebSocket ping frame (keepalive probe)
    Ping,
    /// Normal-closure close frame; the writer stops after sending it
    Close,
}

/// Registry key for a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionHandle {
    pub meeting_id: MeetingId,
    pub connection_id: ConnectionId,
}

/// One participant's live connection
pub struct Connection {
    id: ConnectionId,
    meeting_id: MeetingId,
    identity: ParticipantIdentity,
    outbound: mpsc::Sender<Outbound>,
    state: Mutex<ConnectionState>,
    last_seen: Mutex<Instant>,
    closed: watch::Sender<bool>,
}

impl Connection {
    /// Create a connection in the `Admitting` state.
    ///
    /// Returns the receiving half of the outbound queue, to be handed to
    /// [`spawn_writer`].
    pub fn new(
        meeting_id: MeetingId,
        identity: ParticipantIdentity,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Outbound>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);
        let connection = Self {
            id: ConnectionId::generate(),
            meeting_id,
            identity,
            outbound,
            state: Mutex::new(ConnectionState::Admitting),
            last_seen: Mutex::new(Instant::now()),
            closed,
        };
        (connection, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn meeting_id(&self) -> &MeetingId {
        &self.meeting_id
    }

    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            meeting_id: self.meeting_id.clone(),
            connection_id: self.id,
        }
    }

    /// Serialize and enqueue an envelope
    pub fn send(&self, envelope: &ServerEnvelope) -> Result<(), PushError> {
        let text = serde_json::to_string(envelope).map_err(|e| {
            tracing::error!("Failed to serialize '{}' envelope: {}", envelope.kind(), e);
            PushError::ConnectionClosed
        })?;
        self.send_text(text)
    }

    /// Enqueue an already serialized envelope (broadcast serializes once)
    pub fn send_text(&self, text: String) -> Result<(), PushError> {
        self.enqueue(Outbound::Text(text))
    }

    /// Enqueue a keepalive probe
    pub fn ping(&self) -> Result<(), PushError> {
        self.enqueue(Outbound::Ping)
    }

    fn enqueue(&self, item: Outbound) -> Result<(), PushError> {
        if self.is_closed() {
            return Err(PushError::ConnectionClosed);
        }

        match self.outbound.try_send(item) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    "Outbound queue full for '{}' in room '{}', dropping connection",
                    self.identity.username,
                    self.meeting_id
                );
                self.mark_closed();
                Err(PushError::ConnectionClosed)
            }
            Err(TrySendError::Closed(_)) => {
                self.mark_closed();
                Err(PushError::ConnectionClosed)
            }
        }
    }

    /// Request a graceful close: queue a close frame and refuse further sends
    pub fn close(&self) {
        let _ = self.outbound.try_send(Outbound::Close);
        self.mark_closed();
    }

    /// Refuse further sends and wake everything waiting on [`Connection::closed`]
    pub fn mark_closed(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the connection has been marked closed
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    /// Record inbound activity; resets the liveness window
    pub fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn last_seen(&self) -> Instant {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn idle_for(&self) -> Duration {
        self.last_seen().elapsed()
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a lifecycle event; returns the new state when it changed
    pub fn apply(&self, event: LifecycleEvent) -> Option<ConnectionState> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next = state.transition(event)?;
        *state = next;
        Some(next)
    }
}

/// Spawns the single writer for a connection.
///
/// Drains the outbound queue into the WebSocket sink until the queue closes,
/// a write fails, or a close frame has been sent.
pub fn spawn_writer<S>(mut rx: mpsc::Receiver<Outbound>, mut sink: S) -> JoinHandle<()>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            let is_close = item == Outbound::Close;
            let message = match item {
                Outbound::Text(text) => Message::Text(text.into()),
                Outbound::Ping => Message::Ping(Bytes::new()),
                Outbound::Close => Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: Utf8Bytes::from_static(""),
                })),
            };

            if let Err(e) = sink.send(message).await {
                tracing::debug!("WebSocket write failed: {}", e);
                break;
            }
            if is_close {
                break;
            }
        }
        let _ = sink.close().await;
    })
}
