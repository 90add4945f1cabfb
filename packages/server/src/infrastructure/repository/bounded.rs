//! Meeting Store の期限付きデコレータ
//!
//! 応答しないストアが入室・退出の処理を止めないよう、すべての呼び出しを
//! `timeout` と競わせます。期限切れは [`StoreError::Unavailable`] として返り、
//! 呼び出し側は best-effort の失敗として扱います。

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::domain::{
    ChangeFeed, Meeting, MeetingId, MeetingStore, SessionId, SessionRecord, StoreError, Username,
};

/// Default per-call deadline
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(5_000);

pub struct BoundedMeetingStore {
    inner: Arc<dyn MeetingStore>,
    timeout: Duration,
}

impl BoundedMeetingStore {
    pub fn new(inner: Arc<dyn MeetingStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Store call '{}' did not finish within {:?}",
                    operation,
                    self.timeout
                );
                Err(StoreError::Unavailable(format!(
                    "{operation} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl MeetingStore for BoundedMeetingStore {
    async fn fetch_room(&self, meeting_id: &MeetingId) -> Result<Meeting, StoreError> {
        self.bounded("fetch_room", self.inner.fetch_room(meeting_id))
            .await
    }

    async fn find_session_by_username(
        &self,
        meeting_id: &MeetingId,
        username: &Username,
    ) -> Result<SessionId, StoreError> {
        self.bounded(
            "find_session_by_username",
            self.inner.find_session_by_username(meeting_id, username),
        )
        .await
    }

    async fn remove_session(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
    ) -> Result<SessionRecord, StoreError> {
        self.bounded(
            "remove_session",
            self.inner.remove_session(meeting_id, session_id),
        )
        .await
    }

    async fn add_session(
        &self,
        meeting_id: &MeetingId,
        session: SessionRecord,
    ) -> Result<Meeting, StoreError> {
        self.bounded("add_session", self.inner.add_session(meeting_id, session))
            .await
    }

    async fn insert_meeting_if_absent(&self, meeting: Meeting) -> Result<bool, StoreError> {
        self.bounded(
            "insert_meeting_if_absent",
            self.inner.insert_meeting_if_absent(meeting),
        )
        .await
    }

    async fn upsert_meeting(&self, meeting: Meeting) -> Result<(), StoreError> {
        self.bounded("upsert_meeting", self.inner.upsert_meeting(meeting))
            .await
    }

    /// Only the subscription itself is bounded; the feed runs indefinitely.
    async fn watch_changes(&self, meeting_id: &MeetingId) -> Result<ChangeFeed, StoreError> {
        self.bounded("watch_changes", self.inner.watch_changes(meeting_id))
            .await
    }
}
