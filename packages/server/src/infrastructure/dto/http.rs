//! HTTP API request and response bodies.

use serde::{Deserialize, Serialize};

/// `POST /meetings/{room_id}/notify-tracks-ready`
#[derive(Debug, Clone, Deserialize)]
pub struct TracksReadyRequest {
    pub session_id: String,
    pub username: String,
}

/// `POST /meetings/{room_id}/leave`
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveRequest {
    pub session_id: String,
}

/// `POST /debug/meetings/{room_id}/sessions`
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterSessionRequest {
    pub username: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSessionResponse {
    pub room_id: String,
    pub session_id: String,
}

/// A live participant as seen by the connection registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveParticipantDto {
    pub username: String,
    pub session_id: String,
}

/// `GET /debug/rooms` item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveRoomDto {
    pub room_id: String,
    pub participants: Vec<LiveParticipantDto>,
}
