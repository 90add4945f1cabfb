//! Entities: the durable meeting document and the identity of a live participant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::value_object::{MeetingId, SessionId, Username};

/// One participant's persisted media session inside a meeting document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub username: Username,
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(
        user_id: String,
        username: Username,
        session_id: SessionId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username,
            session_id,
            created_at,
        }
    }
}

/// Meeting document as kept by the durable store.
///
/// This is the payload of `room_state` and `room_updated` envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub room_id: MeetingId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub creator_id: String,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Create an empty meeting document
    pub fn new(
        id: String,
        room_id: MeetingId,
        title: String,
        creator_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            room_id,
            title,
            description: String::new(),
            creator_id,
            sessions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Session of the first participant whose display name matches.
    ///
    /// Display names are not unique; the earliest record wins.
    pub fn find_session_by_username(&self, username: &Username) -> Option<&SessionRecord> {
        self.sessions.iter().find(|s| &s.username == username)
    }

    pub fn find_session(&self, session_id: &SessionId) -> Option<&SessionRecord> {
        self.sessions.iter().find(|s| &s.session_id == session_id)
    }

    /// Remove a session record, returning it if it was present
    pub fn remove_session(
        &mut self,
        session_id: &SessionId,
        now: DateTime<Utc>,
    ) -> Option<SessionRecord> {
        let position = self.sessions.iter().position(|s| &s.session_id == session_id)?;
        self.updated_at = now;
        Some(self.sessions.remove(position))
    }

    pub fn add_session(&mut self, session: SessionRecord, now: DateTime<Utc>) {
        self.sessions.push(session);
        self.updated_at = now;
    }
}

/// Who a live connection belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParticipantIdentity {
    pub username: Username,
    pub session_id: SessionId,
}

impl ParticipantIdentity {
    pub fn new(username: Username, session_id: SessionId) -> Self {
        Self {
            username,
            session_id,
        }
    }
}
