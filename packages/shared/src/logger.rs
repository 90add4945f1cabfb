//! Logging setup utilities for the Kaigi presence server.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// This function sets up logging for the server library crate and the binary.
/// The log level can be overridden using the `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "kaigi-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use kaigi_shared::logger::setup_logger;
///
/// setup_logger("kaigi-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    let binary_target = binary_name.replace('-', "_");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "kaigi_server={level},kaigi_shared={level},{binary}={level},tower_http={level}",
                    level = default_log_level,
                    binary = binary_target,
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
