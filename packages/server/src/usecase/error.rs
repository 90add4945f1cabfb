//! UseCase 層のエラー型

use thiserror::Error;

use crate::domain::StoreError;

/// 参加者接続（入室審査）のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// ミーティングが存在しない、またはユーザー名に一致するセッションがない
    #[error("no session for '{username}' in meeting '{meeting_id}'")]
    IdentityNotFound {
        meeting_id: String,
        username: String,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// HTTP 経由の退出処理のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaveError {
    #[error("session '{session_id}' not found in meeting '{meeting_id}'")]
    SessionNotFound {
        meeting_id: String,
        session_id: String,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

/// ミーティング情報取得のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("meeting '{0}' not found")]
    MeetingNotFound(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<StoreError> for QueryError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::MeetingNotFound(id) => Self::MeetingNotFound(id),
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}
