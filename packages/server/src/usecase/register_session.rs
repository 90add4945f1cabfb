//! UseCase: セッションの登録（開発用）
//!
//! 本来は外部の参加フローがミーティング文書にセッションを書き込みます。
//! 単体で動かすときのために、同じ書き込みを HTTP から行えるようにしたものです。
//! ミーティングが存在しなければ作成します。

use std::sync::Arc;

use kaigi_shared::time::Clock;
use uuid::Uuid;

use crate::domain::{Meeting, MeetingId, MeetingStore, SessionId, SessionRecord, Username};

use super::error::QueryError;

pub struct RegisterSessionUseCase {
    store: Arc<dyn MeetingStore>,
    clock: Arc<dyn Clock>,
}

impl RegisterSessionUseCase {
    pub fn new(store: Arc<dyn MeetingStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// `session_id` が省略された場合は新しく発行する
    pub async fn execute(
        &self,
        meeting_id: &MeetingId,
        username: Username,
        session_id: Option<SessionId>,
    ) -> Result<SessionRecord, QueryError> {
        let now = self.clock.now();
        let user_id = Uuid::new_v4().to_string();

        // 既存の文書は置き換えない（同時登録で先行セッションを消さないため）
        let meeting = Meeting::new(
            Uuid::new_v4().simple().to_string(),
            meeting_id.clone(),
            meeting_id.to_string(),
            user_id.clone(),
            now,
        );
        if self.store.insert_meeting_if_absent(meeting).await? {
            tracing::info!("Meeting '{}' created", meeting_id);
        }

        let session = SessionRecord::new(
            user_id,
            username,
            session_id.unwrap_or_else(SessionId::generate),
            now,
        );
        self.store.add_session(meeting_id, session.clone()).await?;
        tracing::info!(
            "Session '{}' registered for '{}' in '{}'",
            session.session_id,
            session.username,
            meeting_id
        );
        Ok(session)
    }
}
