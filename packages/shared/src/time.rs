//! Time-related utilities with clock abstraction for testability.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

/// Clock trait for dependency injection and testing
pub trait Clock: Send + Sync {
    /// Current wall-clock time in UTC
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (uses actual system time)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fixed clock implementation for testing (returns a fixed time)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a new fixed clock with the given time
    pub fn new(fixed_time: DateTime<Utc>) -> Self {
        Self { fixed_time }
    }

    /// Create a new fixed clock from a Unix timestamp in seconds.
    ///
    /// Out-of-range values fall back to the Unix epoch.
    pub fn from_unix_seconds(seconds: i64) -> Self {
        let fixed_time = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self { fixed_time }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed_time
    }
}

/// Format a time as RFC 3339 with second precision and a `Z` suffix
/// (e.g. `2023-01-01T00:00:00Z`).
pub fn to_rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}
