//! WebSocket envelopes.
//!
//! Every frame is a JSON object `{"type": ..., "payload": ...}`. Outbound
//! envelopes are a tagged union with one payload shape per tag; inbound
//! frames are decoded in two steps so that an unknown `type` is ignored
//! while a broken frame or a bad payload for a known type is an error.

use serde::{Deserialize, Serialize};

use crate::domain::{EnvelopeError, Meeting};

/// `participant_joined` payload. `tracks` stays `null` until the client
/// announces its media tracks through `tracks_ready`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantJoinedPayload {
    pub session_id: String,
    pub username: String,
    pub tracks: Option<serde_json::Value>,
}

/// `participant_left` payload. `session_id` is only known when the leave
/// came through the HTTP leave endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantLeftPayload {
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracksReadyPayload {
    pub session_id: String,
    pub username: String,
}

/// `wave` as re-broadcast by the server. Both fields are server-assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WavePayload {
    pub username: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakingStatePayload {
    pub username: String,
    #[serde(rename = "isSpeaking")]
    pub is_speaking: bool,
}

/// Server → client envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEnvelope {
    RoomState(Meeting),
    ParticipantJoined(ParticipantJoinedPayload),
    ParticipantLeft(ParticipantLeftPayload),
    TracksReady(TracksReadyPayload),
    RoomUpdated(Meeting),
    Wave(WavePayload),
    SpeakingState(SpeakingStatePayload),
    Pong,
}

impl ServerEnvelope {
    /// Wire tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomState(_) => "room_state",
            Self::ParticipantJoined(_) => "participant_joined",
            Self::ParticipantLeft(_) => "participant_left",
            Self::TracksReady(_) => "tracks_ready",
            Self::RoomUpdated(_) => "room_updated",
            Self::Wave(_) => "wave",
            Self::SpeakingState(_) => "speaking_state",
            Self::Pong => "pong",
        }
    }
}

/// Client → server envelope
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEnvelope {
    Ping,
    /// Any client-supplied payload is discarded; the server stamps the
    /// sender's name and its own clock.
    Wave,
    SpeakingState(SpeakingStatePayload),
    /// Unrecognized tag, dropped by the message handler
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

impl ClientEnvelope {
    /// Decode one inbound frame (text or binary JSON)
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let raw: RawEnvelope =
            serde_json::from_slice(bytes).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        match raw.kind.as_str() {
            "ping" => Ok(Self::Ping),
            "wave" => Ok(Self::Wave),
            "speaking_state" => serde_json::from_value(raw.payload)
                .map(Self::SpeakingState)
                .map_err(|e| EnvelopeError::Malformed(format!("speaking_state payload: {e}"))),
            _ => Ok(Self::Unknown(raw.kind)),
        }
    }
}
