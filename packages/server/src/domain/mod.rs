//! Domain layer: identifiers, the meeting document, the durable store
//! interface and the connection lifecycle.
//!
//! Nothing in here performs I/O; the infrastructure layer implements the
//! [`MeetingStore`] trait and owns the live connections.

pub mod entity;
pub mod error;
pub mod lifecycle;
pub mod repository;
pub mod value_object;

pub use entity::{Meeting, ParticipantIdentity, SessionRecord};
pub use error::{EnvelopeError, PushError, StoreError, ValueObjectError};
pub use lifecycle::{ConnectionState, LifecycleEvent};
pub use repository::{ChangeFeed, MeetingStore};
pub use value_object::{ConnectionId, MeetingId, SessionId, Username};

#[cfg(test)]
pub use repository::MockMeetingStore;
