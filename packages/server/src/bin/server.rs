//! Presence and broadcast server for meeting rooms.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin kaigi-server
//! cargo run --bin kaigi-server -- --host 0.0.0.0 --port 7860
//! ```

use std::sync::Arc;

use clap::Parser;
use kaigi_server::{
    config::ServerConfig,
    infrastructure::{BoundedMeetingStore, InMemoryMeetingStore},
    ui::{AppState, Server},
};
use kaigi_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(2);
    }

    // Initialize dependencies in order:
    // 1. Clock
    // 2. Meeting store (bounded by the store timeout)
    // 3. AppState (registry, hub, change bridge, usecases)
    // 4. Server

    // 1. Clock
    let clock = Arc::new(SystemClock);

    // 2. Meeting store
    let store = Arc::new(BoundedMeetingStore::new(
        Arc::new(InMemoryMeetingStore::new(clock.clone())),
        config.store_timeout(),
    ));
    tracing::info!(
        "Meeting store ready (timeout {:?}, heartbeat {:?}, liveness window {:?})",
        config.store_timeout(),
        config.liveness_policy().ping_interval,
        config.liveness_policy().timeout
    );

    // 3. AppState
    let state = AppState::new(store, clock, config.session_settings());

    // 4. Create and run the server
    let server = Server::new(state);
    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
