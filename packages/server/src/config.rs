//! Server configuration (command line with environment fallbacks).

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use crate::infrastructure::{LivenessPolicy, connection::DEFAULT_OUTBOUND_CAPACITY};

/// Invalid combination of settings
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(
        "liveness timeout ({timeout_secs}s) must be longer than the heartbeat interval ({interval_secs}s)"
    )]
    LivenessWindowTooShort {
        interval_secs: u64,
        timeout_secs: u64,
    },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Parser, Debug, Clone)]
#[command(name = "kaigi-server")]
#[command(about = "Realtime presence and broadcast server for meeting rooms", long_about = None)]
pub struct ServerConfig {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "KAIGI_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "KAIGI_PORT", default_value_t = 7860)]
    pub port: u16,

    /// Seconds between keepalive pings sent to each participant
    #[arg(long, env = "KAIGI_HEARTBEAT_INTERVAL_SECS", default_value_t = 30)]
    pub heartbeat_interval_secs: u64,

    /// Seconds of inbound silence after which a participant is dropped
    #[arg(long, env = "KAIGI_LIVENESS_TIMEOUT_SECS", default_value_t = 60)]
    pub liveness_timeout_secs: u64,

    /// Envelopes buffered per participant before it is treated as too slow
    #[arg(long, env = "KAIGI_OUTBOUND_QUEUE_CAPACITY", default_value_t = DEFAULT_OUTBOUND_CAPACITY)]
    pub outbound_queue_capacity: usize,

    /// Deadline for each meeting store call, in milliseconds
    #[arg(long, env = "KAIGI_STORE_TIMEOUT_MS", default_value_t = 5_000)]
    pub store_timeout_ms: u64,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "KAIGI_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Per-connection settings derived from [`ServerConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub liveness: LivenessPolicy,
    pub outbound_capacity: usize,
    /// How long teardown waits for the close frame to be flushed
    pub close_grace: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            liveness: LivenessPolicy::default(),
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            close_grace: Duration::from_secs(1),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::Zero("heartbeat interval"));
        }
        if self.liveness_timeout_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::LivenessWindowTooShort {
                interval_secs: self.heartbeat_interval_secs,
                timeout_secs: self.liveness_timeout_secs,
            });
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ConfigError::Zero("outbound queue capacity"));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Zero("store timeout"));
        }
        Ok(())
    }

    pub fn liveness_policy(&self) -> LivenessPolicy {
        LivenessPolicy {
            ping_interval: Duration::from_secs(self.heartbeat_interval_secs),
            timeout: Duration::from_secs(self.liveness_timeout_secs),
        }
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            liveness: self.liveness_policy(),
            outbound_capacity: self.outbound_queue_capacity,
            ..SessionSettings::default()
        }
    }
}
