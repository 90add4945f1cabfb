//! UseCase: HTTP 経由の退出
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - LeaveMeetingUseCase::execute() メソッド
//! - セッション ID 指定でのストアからの削除と participant_left の配信
//!
//! ### どのような状況を想定しているか
//! - 正常系：セッションの削除と通知（session_id 付き）
//! - 異常系：存在しないセッション、ストア応答なし

use std::sync::Arc;

use crate::{
    domain::{MeetingId, MeetingStore, SessionId, SessionRecord, StoreError},
    infrastructure::BroadcastHub,
};

use super::error::LeaveError;

pub struct LeaveMeetingUseCase {
    store: Arc<dyn MeetingStore>,
    hub: Arc<BroadcastHub>,
}

impl LeaveMeetingUseCase {
    pub fn new(store: Arc<dyn MeetingStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { store, hub }
    }

    /// セッションをミーティングから外し、ルームに通知する
    ///
    /// ライブ接続には触れません。接続側の切断処理はソケットが閉じた時点で走ります。
    pub async fn execute(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
    ) -> Result<SessionRecord, LeaveError> {
        let removed = self
            .store
            .remove_session(meeting_id, session_id)
            .await
            .map_err(|e| match e {
                StoreError::MeetingNotFound(_) | StoreError::SessionNotFound(_) => {
                    LeaveError::SessionNotFound {
                        meeting_id: meeting_id.to_string(),
                        session_id: session_id.to_string(),
                    }
                }
                other => LeaveError::StoreUnavailable(other.to_string()),
            })?;

        self.hub
            .notify_left(meeting_id, &removed.username, Some(session_id))
            .await;
        tracing::info!(
            "'{}' left '{}' (session '{}')",
            removed.username,
            meeting_id,
            session_id
        );
        Ok(removed)
    }
}
