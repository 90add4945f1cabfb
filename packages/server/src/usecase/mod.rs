//! UseCase 層
//!
//! 接続のライフサイクル（入室審査 → 登録 → 切断処理）と、HTTP から呼ばれる
//! 通知・退出・参照系の処理をまとめます。

pub mod connect_participant;
pub mod disconnect_participant;
pub mod error;
pub mod get_live_rooms;
pub mod get_meeting_info;
pub mod handle_message;
pub mod leave_meeting;
pub mod notify_tracks_ready;
pub mod register_session;

pub use connect_participant::ConnectParticipantUseCase;
pub use disconnect_participant::DisconnectParticipantUseCase;
pub use error::{ConnectError, LeaveError, QueryError};
pub use get_live_rooms::GetLiveRoomsUseCase;
pub use get_meeting_info::GetMeetingInfoUseCase;
pub use handle_message::HandleMessageUseCase;
pub use leave_meeting::LeaveMeetingUseCase;
pub use notify_tracks_ready::NotifyTracksReadyUseCase;
pub use register_session::RegisterSessionUseCase;
