//! ルーム単位のブロードキャスト
//!
//! ## 責務
//!
//! - エンベロープを一度だけ直列化し、ルームの全メンバーに配信する
//! - 任意で 1 接続（送信者自身）を配信対象から除外する
//!
//! ## 設計ノート
//!
//! 配信は best-effort です。あるメンバーへの送信が失敗しても残りのメンバーへの
//! 配信は続行し、失敗した接続は [`Connection`] 側で閉じられて自身の切断処理が走ります。
//! 送信はキューへの投入だけなので、遅いクライアントがブロードキャストを止めることはありません。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kaigi_shared::time::to_rfc3339;

use crate::{
    domain::{ConnectionId, Meeting, MeetingId, ParticipantIdentity, SessionId, Username},
    infrastructure::{
        connection::Connection,
        dto::websocket::{
            ParticipantJoinedPayload, ParticipantLeftPayload, ServerEnvelope,
            SpeakingStatePayload, TracksReadyPayload, WavePayload,
        },
        registry::ConnectionRegistry,
    },
};

/// Fan-out over the connection registry
pub struct BroadcastHub {
    registry: Arc<ConnectionRegistry>,
}

impl BroadcastHub {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// ルームの全メンバーに配信し、キュー投入に成功した数を返す
    pub async fn broadcast(&self, meeting_id: &MeetingId, envelope: &ServerEnvelope) -> usize {
        self.fan_out(meeting_id, envelope, None).await
    }

    /// `excluded` 以外の全メンバーに配信し、キュー投入に成功した数を返す
    pub async fn broadcast_except(
        &self,
        meeting_id: &MeetingId,
        envelope: &ServerEnvelope,
        excluded: ConnectionId,
    ) -> usize {
        self.fan_out(meeting_id, envelope, Some(excluded)).await
    }

    async fn fan_out(
        &self,
        meeting_id: &MeetingId,
        envelope: &ServerEnvelope,
        excluded: Option<ConnectionId>,
    ) -> usize {
        let text = match serde_json::to_string(envelope) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize '{}' envelope: {}", envelope.kind(), e);
                return 0;
            }
        };

        let mut targets = 0;
        let mut delivered = 0;
        self.registry
            .for_each(meeting_id, |target| {
                if Some(target.id()) == excluded {
                    return;
                }
                targets += 1;
                // ブロードキャストでは一部の送信失敗を許容
                match target.send_text(text.clone()) {
                    Ok(()) => delivered += 1,
                    Err(e) => tracing::warn!(
                        "Failed to push '{}' to '{}' in room '{}': {}",
                        envelope.kind(),
                        target.identity().username,
                        meeting_id,
                        e
                    ),
                }
            })
            .await;

        tracing::debug!(
            "Broadcasted '{}' to {}/{} member(s) of room '{}'",
            envelope.kind(),
            delivered,
            targets,
            meeting_id
        );
        delivered
    }

    /// 新規参加者を既存メンバーに通知（本人は除外）
    pub async fn notify_joined(&self, joiner: &Connection) -> usize {
        let envelope =
            ServerEnvelope::ParticipantJoined(ParticipantJoinedPayload::from(joiner.identity()));
        self.broadcast_except(joiner.meeting_id(), &envelope, joiner.id())
            .await
    }

    /// 退出を残りのメンバーに通知
    ///
    /// `session_id` は HTTP の leave 経由の場合にのみ付与される
    pub async fn notify_left(
        &self,
        meeting_id: &MeetingId,
        username: &Username,
        session_id: Option<&SessionId>,
    ) -> usize {
        let envelope = ServerEnvelope::ParticipantLeft(ParticipantLeftPayload {
            username: username.to_string(),
            session_id: session_id.map(ToString::to_string),
        });
        self.broadcast(meeting_id, &envelope).await
    }

    pub async fn notify_tracks_ready(
        &self,
        meeting_id: &MeetingId,
        identity: &ParticipantIdentity,
    ) -> usize {
        let envelope = ServerEnvelope::TracksReady(TracksReadyPayload::from(identity));
        self.broadcast(meeting_id, &envelope).await
    }

    pub async fn notify_speaking_state(
        &self,
        meeting_id: &MeetingId,
        payload: SpeakingStatePayload,
    ) -> usize {
        self.broadcast(meeting_id, &ServerEnvelope::SpeakingState(payload))
            .await
    }

    /// 手を振る通知。名前とタイムスタンプはサーバー側で付与する
    pub async fn notify_wave(
        &self,
        meeting_id: &MeetingId,
        username: &Username,
        at: DateTime<Utc>,
    ) -> usize {
        let envelope = ServerEnvelope::Wave(WavePayload {
            username: username.to_string(),
            timestamp: to_rfc3339(at),
        });
        self.broadcast(meeting_id, &envelope).await
    }

    pub async fn notify_room_updated(&self, meeting: &Meeting) -> usize {
        self.broadcast(
            &meeting.room_id,
            &ServerEnvelope::RoomUpdated(meeting.clone()),
        )
        .await
    }
}
