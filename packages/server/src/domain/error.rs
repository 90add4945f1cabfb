//! Domain error types.

use thiserror::Error;

/// Validation failure when building a value object
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("{kind} must be at most {max} characters")]
    TooLong { kind: &'static str, max: usize },
}

/// Durable meeting store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("meeting '{0}' not found")]
    MeetingNotFound(String),

    #[error("session not found in meeting '{0}'")]
    SessionNotFound(String),

    /// The store did not answer (timeout, connection loss). Best-effort
    /// callers log and continue.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The change feed broke or fell behind; subscribers re-subscribe.
    #[error("change feed error: {0}")]
    ChangeFeed(String),
}

/// Failure to hand a message to a connection's send path
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushError {
    /// The connection is closed, broken, or too slow to keep up.
    /// Callers drop the message and let the connection's teardown run.
    #[error("connection closed")]
    ConnectionClosed,
}

/// Inbound envelope could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(String),
}
