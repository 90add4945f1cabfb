//! 生存確認（デッドマンスイッチ）
//!
//! 接続ごとに 1 つの監視タスクが `ping_interval` ごとに送信経路へ keepalive を積み、
//! `timeout` の間まったく受信がなければ接続を終了させます。
//! 受信したフレームは（pong フレームも含めて）すべて生存の印として扱います。

use std::sync::Arc;

use tokio::time::{Duration, MissedTickBehavior};

use super::connection::Connection;

pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    pub ping_interval: Duration,
    pub timeout: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            timeout: DEFAULT_LIVENESS_TIMEOUT,
        }
    }
}

/// Why a supervisor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessOutcome {
    /// Nothing was received within the liveness window
    Expired,
    /// The connection was closed by someone else (or a probe could not be queued)
    Closed,
}

/// Supervise one connection until it expires or closes
pub async fn supervise(connection: Arc<Connection>, policy: LivenessPolicy) -> LivenessOutcome {
    let mut ticker = tokio::time::interval_at(
        tokio::time::Instant::now() + policy.ping_interval,
        policy.ping_interval,
    );
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let deadline = connection.last_seen() + policy.timeout;

        tokio::select! {
            _ = ticker.tick() => {
                if connection.ping().is_err() {
                    return LivenessOutcome::Closed;
                }
                tracing::trace!("Sent keepalive to '{}'", connection.identity().username);
            }
            _ = tokio::time::sleep_until(deadline) => {
                // Activity may have arrived while sleeping; re-check against the latest value.
                if connection.idle_for() >= policy.timeout {
                    tracing::info!(
                        "Liveness window of {:?} elapsed for '{}' in room '{}'",
                        policy.timeout,
                        connection.identity().username,
                        connection.meeting_id()
                    );
                    return LivenessOutcome::Expired;
                }
            }
            _ = connection.closed() => {
                return LivenessOutcome::Closed;
            }
        }
    }
}
