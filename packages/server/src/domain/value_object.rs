//! Value objects: validated identifiers used across the presence layer.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValueObjectError;

const MAX_MEETING_ID_LENGTH: usize = 128;
const MAX_USERNAME_LENGTH: usize = 100;
const MAX_SESSION_ID_LENGTH: usize = 256;

fn validate(kind: &'static str, value: &str, max: usize) -> Result<(), ValueObjectError> {
    if value.trim().is_empty() {
        return Err(ValueObjectError::Empty(kind));
    }
    if value.chars().count() > max {
        return Err(ValueObjectError::TooLong { kind, max });
    }
    Ok(())
}

/// Meeting (room) identifier. Opaque and stable for the room's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeetingId(String);

impl MeetingId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate("meeting id", &value, MAX_MEETING_ID_LENGTH)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Display name supplied by the client. Not guaranteed unique within a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate("username", &value, MAX_USERNAME_LENGTH)?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Media session identifier minted by the external real-time media provider.
///
/// It is the join key between a socket and the persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: String) -> Result<Self, ValueObjectError> {
        validate("session id", &value, MAX_SESSION_ID_LENGTH)?;
        Ok(Self(value))
    }

    /// Mint a random session id (used when seeding sessions without a media provider).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Server-side handle for one live connection. Never sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! impl_string_conversions {
    ($($name:ident),*) => {
        $(
            impl TryFrom<String> for $name {
                type Error = ValueObjectError;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    Self::new(value)
                }
            }

            impl From<$name> for String {
                fn from(value: $name) -> Self {
                    value.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        )*
    };
}

impl_string_conversions!(MeetingId, Username, SessionId);
