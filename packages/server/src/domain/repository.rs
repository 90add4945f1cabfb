//! Meeting store trait 定義
//!
//! プレゼンス層が必要とする永続ストアへのインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use super::{Meeting, MeetingId, SessionId, SessionRecord, StoreError, Username};

/// Lazy, infinite stream of updated meeting documents for one room.
///
/// An `Err` item means the feed broke; the subscriber drops the stream and
/// subscribes again.
pub type ChangeFeed = BoxStream<'static, Result<Meeting, StoreError>>;

/// Durable meeting store
///
/// Only the read/write contract and the change feed are consumed here; the
/// query semantics belong to the store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MeetingStore: Send + Sync {
    /// Full meeting document
    async fn fetch_room(&self, meeting_id: &MeetingId) -> Result<Meeting, StoreError>;

    /// Session id of the first session record whose username matches
    async fn find_session_by_username(
        &self,
        meeting_id: &MeetingId,
        username: &Username,
    ) -> Result<SessionId, StoreError>;

    /// Remove a session record, returning the removed record
    async fn remove_session(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
    ) -> Result<SessionRecord, StoreError>;

    /// Append a session record to an existing meeting
    async fn add_session(
        &self,
        meeting_id: &MeetingId,
        session: SessionRecord,
    ) -> Result<Meeting, StoreError>;

    /// Insert a meeting document unless one already exists for its room.
    ///
    /// Returns `true` when the document was inserted.
    async fn insert_meeting_if_absent(&self, meeting: Meeting) -> Result<bool, StoreError>;

    /// Insert or replace a whole meeting document
    async fn upsert_meeting(&self, meeting: Meeting) -> Result<(), StoreError>;

    /// Subscribe to update notifications for one meeting
    async fn watch_changes(&self, meeting_id: &MeetingId) -> Result<ChangeFeed, StoreError>;
}
