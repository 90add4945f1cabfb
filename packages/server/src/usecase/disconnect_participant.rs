//! UseCase: 参加者切断処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - DisconnectParticipantUseCase::execute() メソッド
//! - 切断処理（登録解除、ストアからのセッション削除、退出通知、接続のクローズ）
//!
//! ### なぜこのテストが必要か
//! - 残りの参加者に participant_left がちょうど 1 回届くことを保証
//! - ストアの障害で切断処理が止まらないことを確認
//! - 最後の参加者が抜けたときにルームと変更購読が片付くことを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：参加者の切断と通知
//! - エッジケース：最後の参加者の切断、二重の切断処理
//! - 異常系：ストアが応答しない

use std::sync::Arc;

use crate::{
    domain::{ConnectionState, LifecycleEvent, MeetingStore},
    infrastructure::{BroadcastHub, ChangeBridge, Connection, ConnectionRegistry},
};

/// 参加者切断のユースケース
pub struct DisconnectParticipantUseCase {
    store: Arc<dyn MeetingStore>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<BroadcastHub>,
    bridge: Arc<ChangeBridge>,
}

impl DisconnectParticipantUseCase {
    pub fn new(
        store: Arc<dyn MeetingStore>,
        registry: Arc<ConnectionRegistry>,
        hub: Arc<BroadcastHub>,
        bridge: Arc<ChangeBridge>,
    ) -> Self {
        Self {
            store,
            registry,
            hub,
            bridge,
        }
    }

    /// 切断処理を実行
    ///
    /// Active な接続に対してだけ一度だけ実行され、2 回目以降は何もしません。
    ///
    /// # Returns
    ///
    /// * `true` - この呼び出しで切断処理を行った
    /// * `false` - 既に切断処理済み、または Active になる前の接続
    pub async fn execute(&self, connection: &Connection) -> bool {
        match connection.apply(LifecycleEvent::Disconnected) {
            Some(ConnectionState::Leaving) => {}
            Some(_) => {
                // 登録前に切断された接続
                connection.close();
                return false;
            }
            None => return false,
        }

        let meeting_id = connection.meeting_id();
        let identity = connection.identity();

        // 1. レジストリから外す（ルームが空になれば変更購読も止める）
        let removal = self.registry.unregister(&connection.handle()).await;
        if removal.room_deleted {
            self.bridge.release(meeting_id).await;
        }

        // 2. ストアからセッションを削除（失敗してもログを残して続行）
        match self
            .store
            .remove_session(meeting_id, &identity.session_id)
            .await
        {
            Ok(_) => tracing::debug!(
                "Session '{}' removed from '{}'",
                identity.session_id,
                meeting_id
            ),
            Err(e) => tracing::warn!(
                "Failed to remove session '{}' from '{}': {}",
                identity.session_id,
                meeting_id,
                e
            ),
        }

        // 3. 残りの参加者に通知
        self.hub
            .notify_left(meeting_id, &identity.username, None)
            .await;

        connection.apply(LifecycleEvent::CleanedUp);
        connection.close();
        tracing::info!("'{}' left '{}'", identity.username, meeting_id);
        true
    }
}
