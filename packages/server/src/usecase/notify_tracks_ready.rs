//! UseCase: メディアトラック準備完了の通知
//!
//! HTTP 経由で呼ばれ、ルームの全員に tracks_ready を配信します。
//! 対象の参加者やルームが既にいなくてもエラーにはしません（best-effort）。

use std::sync::Arc;

use crate::{
    domain::{MeetingId, ParticipantIdentity},
    infrastructure::BroadcastHub,
};

pub struct NotifyTracksReadyUseCase {
    hub: Arc<BroadcastHub>,
}

impl NotifyTracksReadyUseCase {
    pub fn new(hub: Arc<BroadcastHub>) -> Self {
        Self { hub }
    }

    /// 配信できた接続数を返す
    pub async fn execute(&self, meeting_id: &MeetingId, identity: &ParticipantIdentity) -> usize {
        let delivered = self.hub.notify_tracks_ready(meeting_id, identity).await;
        tracing::debug!(
            "tracks_ready for '{}' in '{}' delivered to {} member(s)",
            identity.username,
            meeting_id,
            delivered
        );
        delivered
    }
}
