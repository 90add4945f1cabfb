//! UseCase: ミーティング情報の取得

use std::sync::Arc;

use crate::domain::{Meeting, MeetingId, MeetingStore};

use super::error::QueryError;

pub struct GetMeetingInfoUseCase {
    store: Arc<dyn MeetingStore>,
}

impl GetMeetingInfoUseCase {
    pub fn new(store: Arc<dyn MeetingStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, meeting_id: &MeetingId) -> Result<Meeting, QueryError> {
        Ok(self.store.fetch_room(meeting_id).await?)
    }
}
