//! UseCase: 接続中のルーム一覧（デバッグ用）

use std::sync::Arc;

use crate::infrastructure::{ConnectionRegistry, LiveRoom};

pub struct GetLiveRoomsUseCase {
    registry: Arc<ConnectionRegistry>,
}

impl GetLiveRoomsUseCase {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// ルーム ID 順、各ルーム内はユーザー名順
    pub async fn execute(&self) -> Vec<LiveRoom> {
        self.registry.snapshot().await
    }
}
