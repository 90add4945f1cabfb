//! InMemory Meeting Store 実装
//!
//! ドメイン層が定義する `MeetingStore` trait の具体的な実装。
//! HashMap をインメモリ DB として使用し、変更フィードは
//! `tokio::sync::broadcast` で実現します。
//!
//! ## 設計ノート
//!
//! 書き込みが成功するたびに、更新後のミーティング文書全体をフィードに流します。
//! 購読者は自分のルームの文書だけを受け取ります。購読者が遅れて
//! broadcast のバッファから取りこぼした場合は `StoreError::ChangeFeed` を
//! 1 件返してストリームを終了し、再購読は購読者側（ChangeBridge）の責務とします。

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::Arc,
};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};
use kaigi_shared::time::Clock;
use tokio::sync::{RwLock, broadcast};

use crate::domain::{
    ChangeFeed, Meeting, MeetingId, MeetingStore, SessionId, SessionRecord, StoreError, Username,
};

/// Buffered change notifications shared by all subscribers
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// インメモリ Meeting Store 実装
pub struct InMemoryMeetingStore {
    meetings: RwLock<HashMap<MeetingId, Meeting>>,
    changes: broadcast::Sender<Meeting>,
    clock: Arc<dyn Clock>,
}

impl InMemoryMeetingStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            meetings: RwLock::new(HashMap::new()),
            changes,
            clock,
        }
    }

    fn publish(&self, meeting: &Meeting) {
        // 購読者がいない場合の送信エラーは無視
        let _ = self.changes.send(meeting.clone());
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn fetch_room(&self, meeting_id: &MeetingId) -> Result<Meeting, StoreError> {
        self.meetings
            .read()
            .await
            .get(meeting_id)
            .cloned()
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))
    }

    async fn find_session_by_username(
        &self,
        meeting_id: &MeetingId,
        username: &Username,
    ) -> Result<SessionId, StoreError> {
        let meetings = self.meetings.read().await;
        let meeting = meetings
            .get(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        meeting
            .find_session_by_username(username)
            .map(|s| s.session_id.clone())
            .ok_or_else(|| StoreError::SessionNotFound(meeting_id.to_string()))
    }

    async fn remove_session(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
    ) -> Result<SessionRecord, StoreError> {
        let mut meetings = self.meetings.write().await;
        let meeting = meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        let removed = meeting
            .remove_session(session_id, self.clock.now())
            .ok_or_else(|| StoreError::SessionNotFound(meeting_id.to_string()))?;

        self.publish(meeting);
        Ok(removed)
    }

    async fn add_session(
        &self,
        meeting_id: &MeetingId,
        session: SessionRecord,
    ) -> Result<Meeting, StoreError> {
        let mut meetings = self.meetings.write().await;
        let meeting = meetings
            .get_mut(meeting_id)
            .ok_or_else(|| StoreError::MeetingNotFound(meeting_id.to_string()))?;
        meeting.add_session(session, self.clock.now());

        self.publish(meeting);
        Ok(meeting.clone())
    }

    async fn insert_meeting_if_absent(&self, meeting: Meeting) -> Result<bool, StoreError> {
        let mut meetings = self.meetings.write().await;
        match meetings.entry(meeting.room_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                let inserted = slot.insert(meeting);
                self.publish(inserted);
                Ok(true)
            }
        }
    }

    async fn upsert_meeting(&self, meeting: Meeting) -> Result<(), StoreError> {
        let mut meetings = self.meetings.write().await;
        let stored = meetings
            .entry(meeting.room_id.clone())
            .insert_entry(meeting);
        self.publish(stored.get());
        Ok(())
    }

    async fn watch_changes(&self, meeting_id: &MeetingId) -> Result<ChangeFeed, StoreError> {
        let rx = self.changes.subscribe();
        let meeting_id = meeting_id.clone();

        let feed = stream::unfold(Some(rx), move |state| {
            let meeting_id = meeting_id.clone();
            async move {
                let mut rx = state?;
                loop {
                    match rx.recv().await {
                        Ok(meeting) if meeting.room_id == meeting_id => {
                            return Some((Ok(meeting), Some(rx)));
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            let error = StoreError::ChangeFeed(format!(
                                "subscriber for '{meeting_id}' lagged by {skipped} update(s)"
                            ));
                            return Some((Err(error), None));
                        }
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            }
        });

        Ok(feed.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kaigi_shared::time::FixedClock;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - InMemoryMeetingStore の基本的な読み書き
    // - ユーザー名によるセッション検索（同名の場合は先頭が勝つ）
    // - 書き込みごとに変更フィードへ更新後の文書が流れること
    // - フィードが自分のルームだけを流し、取りこぼし時にエラーで終わること
    // ========================================

    fn meeting_id(value: &str) -> MeetingId {
        MeetingId::new(value.to_string()).unwrap()
    }

    fn session(username: &str, session_id: &str, clock: &FixedClock) -> SessionRecord {
        SessionRecord::new(
            format!("user-{username}"),
            Username::new(username.to_string()).unwrap(),
            SessionId::new(session_id.to_string()).unwrap(),
            clock.now(),
        )
    }

    async fn create_test_store(rooms: &[&str]) -> (InMemoryMeetingStore, FixedClock) {
        let clock = FixedClock::from_unix_seconds(1_700_000_000);
        let store = InMemoryMeetingStore::new(Arc::new(clock));
        for room in rooms {
            let meeting = Meeting::new(
                format!("doc-{room}"),
                meeting_id(room),
                format!("Meeting {room}"),
                "creator".to_string(),
                clock.now(),
            );
            store.upsert_meeting(meeting).await.unwrap();
        }
        (store, clock)
    }

    #[tokio::test]
    async fn test_fetch_missing_room_is_not_found() {
        // テスト項目: 存在しないルームの取得は MeetingNotFound になる
        // given (前提条件):
        let (store, _) = create_test_store(&[]).await;

        // when (操作):
        let result = store.fetch_room(&meeting_id("R404")).await;

        // then (期待する結果):
        assert_eq!(result, Err(StoreError::MeetingNotFound("R404".to_string())));
    }

    #[tokio::test]
    async fn test_find_session_by_username_first_match_wins() {
        // テスト項目: 同名のセッションが複数ある場合は先に登録された方が返る
        // given (前提条件):
        let (store, clock) = create_test_store(&["R1"]).await;
        store
            .add_session(&meeting_id("R1"), session("alice", "first", &clock))
            .await
            .unwrap();
        store
            .add_session(&meeting_id("R1"), session("alice", "second", &clock))
            .await
            .unwrap();

        // when (操作):
        let found = store
            .find_session_by_username(&meeting_id("R1"), &Username::new("alice".to_string()).unwrap())
            .await;
        let missing = store
            .find_session_by_username(&meeting_id("R1"), &Username::new("bob".to_string()).unwrap())
            .await;

        // then (期待する結果):
        assert_eq!(found.unwrap().as_str(), "first");
        assert_eq!(missing, Err(StoreError::SessionNotFound("R1".to_string())));
    }

    #[tokio::test]
    async fn test_remove_session() {
        // テスト項目: セッション削除で削除済みレコードが返り、二度目は SessionNotFound
        // given (前提条件):
        let (store, clock) = create_test_store(&["R1"]).await;
        store
            .add_session(&meeting_id("R1"), session("bob", "s2", &clock))
            .await
            .unwrap();
        let sid = SessionId::new("s2".to_string()).unwrap();

        // when (操作):
        let removed = store.remove_session(&meeting_id("R1"), &sid).await;
        let again = store.remove_session(&meeting_id("R1"), &sid).await;

        // then (期待する結果):
        assert_eq!(removed.unwrap().username.as_str(), "bob");
        assert_eq!(again, Err(StoreError::SessionNotFound("R1".to_string())));
        assert!(store.fetch_room(&meeting_id("R1")).await.unwrap().sessions.is_empty());
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_existing_document() {
        // テスト項目: 既存の文書は置き換えられず、追加済みのセッションも残る
        // given (前提条件):
        let (store, clock) = create_test_store(&["R1"]).await;
        store
            .add_session(&meeting_id("R1"), session("alice", "s1", &clock))
            .await
            .unwrap();
        let replacement = Meeting::new(
            "doc-other".to_string(),
            meeting_id("R1"),
            "Other".to_string(),
            "creator".to_string(),
            clock.now(),
        );

        // when (操作):
        let inserted = store.insert_meeting_if_absent(replacement.clone()).await;
        let fresh = store
            .insert_meeting_if_absent(Meeting {
                room_id: meeting_id("R2"),
                ..replacement
            })
            .await;

        // then (期待する結果):
        assert_eq!(inserted, Ok(false));
        assert_eq!(fresh, Ok(true));
        let meeting = store.fetch_room(&meeting_id("R1")).await.unwrap();
        assert_eq!(meeting.title, "Meeting R1");
        assert_eq!(meeting.sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_publishes_stored_document() {
        // テスト項目: upsert 後にフィードへ流れる文書は、その時点でストアから読める文書と一致する
        // given (前提条件):
        let (store, clock) = create_test_store(&["R1"]).await;
        let mut feed = store.watch_changes(&meeting_id("R1")).await.unwrap();
        let mut meeting = store.fetch_room(&meeting_id("R1")).await.unwrap();
        meeting.title = "Retro".to_string();
        meeting.add_session(session("alice", "s1", &clock), clock.now());

        // when (操作):
        store.upsert_meeting(meeting).await.unwrap();

        // then (期待する結果):
        let update = feed.next().await.unwrap().unwrap();
        assert_eq!(update.title, "Retro");
        assert_eq!(store.fetch_room(&meeting_id("R1")).await.unwrap(), update);
    }

    #[tokio::test]
    async fn test_watch_changes_streams_only_own_room() {
        // テスト項目: 変更フィードには購読したルームの更新だけが流れる
        // given (前提条件):
        let (store, clock) = create_test_store(&["R1", "R2"]).await;
        let mut feed = store.watch_changes(&meeting_id("R1")).await.unwrap();

        // when (操作):
        store
            .add_session(&meeting_id("R2"), session("carol", "s3", &clock))
            .await
            .unwrap();
        store
            .add_session(&meeting_id("R1"), session("alice", "s1", &clock))
            .await
            .unwrap();

        // then (期待する結果):
        let update = feed.next().await.unwrap().unwrap();
        assert_eq!(update.room_id.as_str(), "R1");
        assert_eq!(update.sessions.len(), 1);
        assert_eq!(update.sessions[0].username.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_lagging_subscriber_gets_error_then_end() {
        // テスト項目: バッファを超えて取りこぼした購読者にはエラーが 1 件返り、フィードが終わる
        // given (前提条件):
        let (store, clock) = create_test_store(&["R1"]).await;
        let mut feed = store.watch_changes(&meeting_id("R1")).await.unwrap();

        // when (操作):
        for i in 0..(CHANGE_FEED_CAPACITY + 10) {
            store
                .add_session(&meeting_id("R1"), session("alice", &format!("s{i}"), &clock))
                .await
                .unwrap();
        }

        // then (期待する結果):
        assert!(matches!(feed.next().await, Some(Err(StoreError::ChangeFeed(_)))));
        assert!(feed.next().await.is_none());
    }
}
