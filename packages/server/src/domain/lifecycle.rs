//! Connection lifecycle state machine.
//!
//! ```text
//! Admitting --Activated--> Active --Disconnected--> Leaving --CleanedUp--> Closed
//!     \------------------------Disconnected-------------------------------/
//! ```
//!
//! Admission (session lookup) happens before the socket exists, so a
//! connection object is born in `Admitting` and becomes `Active` once it is
//! registered in its room.

/// Lifecycle state of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Admitting,
    Active,
    Leaving,
    Closed,
}

/// Events that drive the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Registered in the room
    Activated,
    /// Inbound loop ended, liveness expired, or the send path broke
    Disconnected,
    /// Leave side effects finished (best-effort)
    CleanedUp,
}

impl ConnectionState {
    /// Next state, or `None` when the event does not apply in this state.
    ///
    /// `None` makes repeated or late events no-ops, which is what keeps
    /// leave handling idempotent.
    pub fn transition(self, event: LifecycleEvent) -> Option<Self> {
        use ConnectionState::*;
        use LifecycleEvent::*;

        match (self, event) {
            (Admitting, Activated) => Some(Active),
            (Admitting, Disconnected) => Some(Closed),
            (Active, Disconnected) => Some(Leaving),
            (Leaving, CleanedUp) => Some(Closed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Closed
    }
}
