//! Conversion logic between DTOs and domain entities.

use crate::domain::ParticipantIdentity;
use crate::infrastructure::{
    dto::{
        http::{LiveParticipantDto, LiveRoomDto},
        websocket::{ParticipantJoinedPayload, TracksReadyPayload},
    },
    registry::LiveRoom,
};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&ParticipantIdentity> for ParticipantJoinedPayload {
    fn from(identity: &ParticipantIdentity) -> Self {
        Self {
            session_id: identity.session_id.as_str().to_string(),
            username: identity.username.as_str().to_string(),
            tracks: None,
        }
    }
}

impl From<&ParticipantIdentity> for TracksReadyPayload {
    fn from(identity: &ParticipantIdentity) -> Self {
        Self {
            session_id: identity.session_id.as_str().to_string(),
            username: identity.username.as_str().to_string(),
        }
    }
}

impl From<ParticipantIdentity> for LiveParticipantDto {
    fn from(identity: ParticipantIdentity) -> Self {
        Self {
            username: identity.username.into_string(),
            session_id: identity.session_id.into_string(),
        }
    }
}

impl From<LiveRoom> for LiveRoomDto {
    fn from(room: LiveRoom) -> Self {
        Self {
            room_id: room.meeting_id.into_string(),
            participants: room.participants.into_iter().map(Into::into).collect(),
        }
    }
}
