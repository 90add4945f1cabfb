//! Server state and dependency wiring.

use std::sync::Arc;

use kaigi_shared::time::Clock;

use crate::{
    config::SessionSettings,
    domain::MeetingStore,
    infrastructure::{BroadcastHub, ChangeBridge, ConnectionRegistry, RetryPolicy},
    usecase::{
        ConnectParticipantUseCase, DisconnectParticipantUseCase, GetLiveRoomsUseCase,
        GetMeetingInfoUseCase, HandleMessageUseCase, LeaveMeetingUseCase,
        NotifyTracksReadyUseCase, RegisterSessionUseCase,
    },
};

/// Shared application state
pub struct AppState {
    /// ConnectParticipantUseCase（入室審査と登録）
    pub connect_participant_usecase: Arc<ConnectParticipantUseCase>,
    /// DisconnectParticipantUseCase（切断処理）
    pub disconnect_participant_usecase: Arc<DisconnectParticipantUseCase>,
    /// HandleMessageUseCase（受信エンベロープの処理）
    pub handle_message_usecase: Arc<HandleMessageUseCase>,
    pub notify_tracks_ready_usecase: Arc<NotifyTracksReadyUseCase>,
    pub leave_meeting_usecase: Arc<LeaveMeetingUseCase>,
    pub get_meeting_info_usecase: Arc<GetMeetingInfoUseCase>,
    pub get_live_rooms_usecase: Arc<GetLiveRoomsUseCase>,
    pub register_session_usecase: Arc<RegisterSessionUseCase>,
    /// 接続ごとの設定（生存確認、送信キュー容量）
    pub settings: SessionSettings,
}

impl AppState {
    /// Wire the presence layer on top of a meeting store.
    ///
    /// Dependencies are created in order:
    /// 1. ConnectionRegistry
    /// 2. BroadcastHub
    /// 3. ChangeBridge
    /// 4. UseCases
    pub fn new(
        store: Arc<dyn MeetingStore>,
        clock: Arc<dyn Clock>,
        settings: SessionSettings,
    ) -> Self {
        // 1. Registry (live rooms)
        let registry = Arc::new(ConnectionRegistry::new());

        // 2. Hub (fan-out over the registry)
        let hub = Arc::new(BroadcastHub::new(registry.clone()));

        // 3. ChangeBridge (store change feed -> room_updated)
        let bridge = Arc::new(ChangeBridge::new(
            store.clone(),
            hub.clone(),
            registry.clone(),
            RetryPolicy::default(),
        ));

        // 4. UseCases
        Self {
            connect_participant_usecase: Arc::new(ConnectParticipantUseCase::new(
                store.clone(),
                registry.clone(),
                hub.clone(),
                bridge.clone(),
            )),
            disconnect_participant_usecase: Arc::new(DisconnectParticipantUseCase::new(
                store.clone(),
                registry.clone(),
                hub.clone(),
                bridge,
            )),
            handle_message_usecase: Arc::new(HandleMessageUseCase::new(
                hub.clone(),
                clock.clone(),
            )),
            notify_tracks_ready_usecase: Arc::new(NotifyTracksReadyUseCase::new(hub.clone())),
            leave_meeting_usecase: Arc::new(LeaveMeetingUseCase::new(store.clone(), hub)),
            get_meeting_info_usecase: Arc::new(GetMeetingInfoUseCase::new(store.clone())),
            get_live_rooms_usecase: Arc::new(GetLiveRoomsUseCase::new(registry)),
            register_session_usecase: Arc::new(RegisterSessionUseCase::new(store, clock)),
            settings,
        }
    }
}
