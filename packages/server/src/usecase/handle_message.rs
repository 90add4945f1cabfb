//! UseCase: 受信メッセージ処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - HandleMessageUseCase::execute() メソッド
//! - エンベロープ種別ごとの振り分け（ping / wave / speaking_state / 未知）
//!
//! ### なぜこのテストが必要か
//! - ping への pong は送信者本人だけに返す必要がある
//! - wave のユーザー名とタイムスタンプはサーバー側で付与し、偽装を防ぐ
//! - speaking_state はそのまま転送されることを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：各種別の処理
//! - エッジケース：未知の種別（エラーにせず破棄）

use std::sync::Arc;

use kaigi_shared::time::Clock;

use crate::infrastructure::{
    BroadcastHub, Connection,
    dto::websocket::{ClientEnvelope, ServerEnvelope},
};

/// 受信メッセージ処理のユースケース
pub struct HandleMessageUseCase {
    hub: Arc<BroadcastHub>,
    clock: Arc<dyn Clock>,
}

impl HandleMessageUseCase {
    pub fn new(hub: Arc<BroadcastHub>, clock: Arc<dyn Clock>) -> Self {
        Self { hub, clock }
    }

    /// デコード済みのエンベロープを 1 件処理する
    pub async fn execute(&self, sender: &Connection, envelope: ClientEnvelope) {
        let meeting_id = sender.meeting_id();

        match envelope {
            ClientEnvelope::Ping => {
                if let Err(e) = sender.send(&ServerEnvelope::Pong) {
                    tracing::debug!(
                        "pong not delivered to '{}': {}",
                        sender.identity().username,
                        e
                    );
                }
            }
            ClientEnvelope::Wave => {
                self.hub
                    .notify_wave(meeting_id, &sender.identity().username, self.clock.now())
                    .await;
            }
            ClientEnvelope::SpeakingState(payload) => {
                self.hub.notify_speaking_state(meeting_id, payload).await;
            }
            ClientEnvelope::Unknown(kind) => {
                tracing::debug!(
                    "Ignoring '{}' envelope from '{}'",
                    kind,
                    sender.identity().username
                );
            }
        }
    }
}
