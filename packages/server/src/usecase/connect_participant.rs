//! UseCase: 参加者接続処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - ConnectParticipantUseCase::admit() / activate() メソッド
//! - 入室審査（ユーザー名からセッション ID を引く）と、審査後の登録処理
//!
//! ### なぜこのテストが必要か
//! - 審査に失敗した場合はソケットのアップグレード前に拒否する必要がある
//! - 登録後、本人には room_state、他の参加者には participant_joined が届くことを保証
//! - ルームごとの変更購読が 1 つだけ開始されることを確認
//!
//! ### どのような状況を想定しているか
//! - 正常系：既存ルームへの入室
//! - 異常系：ルームが存在しない、セッションが見つからない、ストア応答なし
//! - エッジケース：同名セッションが複数ある場合（先頭が採用される）

use std::sync::Arc;

use crate::{
    domain::{LifecycleEvent, MeetingId, MeetingStore, ParticipantIdentity, StoreError, Username},
    infrastructure::{
        BroadcastHub, ChangeBridge, Connection, ConnectionHandle, ConnectionRegistry,
        dto::websocket::ServerEnvelope,
    },
};

use super::error::ConnectError;

/// 参加者接続のユースケース
pub struct ConnectParticipantUseCase {
    store: Arc<dyn MeetingStore>,
    registry: Arc<ConnectionRegistry>,
    hub: Arc<BroadcastHub>,
    bridge: Arc<ChangeBridge>,
}

impl ConnectParticipantUseCase {
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

    /// 入室審査
    ///
    /// ユーザー名に一致する最初のセッションを参加者の ID とします。
    /// ソケットのアップグレード前に呼ばれ、失敗した場合は接続を確立しません。
    pub async fn admit(
        &self,
        meeting_id: &MeetingId,
        username: Username,
    ) -> Result<ParticipantIdentity, ConnectError> {
        match self
            .store
            .find_session_by_username(meeting_id, &username)
            .await
        {
            Ok(session_id) => {
                tracing::debug!(
                    "Admitted '{}' to '{}' with session '{}'",
                    username,
                    meeting_id,
                    session_id
                );
                Ok(ParticipantIdentity::new(username, session_id))
            }
            Err(StoreError::MeetingNotFound(_) | StoreError::SessionNotFound(_)) => {
                Err(ConnectError::IdentityNotFound {
                    meeting_id: meeting_id.to_string(),
                    username: username.into_string(),
                })
            }
            Err(e) => Err(ConnectError::StoreUnavailable(e.to_string())),
        }
    }

    /// 審査済みの接続を Active にする
    ///
    /// 1. レジストリに登録
    /// 2. 本人に room_state を送信
    /// 3. 他の参加者に participant_joined を通知
    /// 4. ルームの変更購読を（なければ）開始
    ///
    /// 接続が既に Admitting でない場合は何もせず `None` を返す
    pub async fn activate(&self, connection: &Arc<Connection>) -> Option<ConnectionHandle> {
        connection.apply(LifecycleEvent::Activated)?;

        let meeting_id = connection.meeting_id().clone();
        let registration = self.registry.register(connection.clone()).await;

        // 2. 現在のルーム状態（取得失敗時は送らずに続行）
        match self.store.fetch_room(&meeting_id).await {
            Ok(meeting) => {
                if let Err(e) = connection.send(&ServerEnvelope::RoomState(meeting)) {
                    tracing::debug!("room_state not delivered: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to load room state for '{}': {}", meeting_id, e),
        }

        // 3. 他の参加者に通知
        self.hub.notify_joined(connection).await;

        // 4. 変更購読
        self.bridge.ensure(&meeting_id).await;

        tracing::info!(
            "'{}' joined '{}'{}",
            connection.identity().username,
            meeting_id,
            if registration.room_created {
                " (room created)"
            } else {
                ""
            }
        );
        Some(registration.handle)
    }
}
