//! Server execution logic.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    handler::{
        debug_live_rooms, debug_register_session, get_meeting_info, health_check, leave_meeting,
        notify_tracks_ready, websocket_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Presence server
///
/// # Example
///
/// ```ignore
/// let state = AppState::new(store, clock, config.session_settings());
/// Server::new(state).run("127.0.0.1".to_string(), 7860).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Build the router with all endpoints and layers
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket エンドポイント
            .route("/ws/meetings/{room_id}", get(websocket_handler))
            // HTTP エンドポイント
            .route(
                "/meetings/{room_id}/notify-tracks-ready",
                post(notify_tracks_ready),
            )
            .route("/meetings/{room_id}/leave", post(leave_meeting))
            .route("/meetings/{room_id}/info", get(get_meeting_info))
            .route("/api/health", get(health_check))
            // デバッグ用エンドポイント
            .route("/debug/rooms", get(debug_live_rooms))
            .route(
                "/debug/meetings/{room_id}/sessions",
                post(debug_register_session),
            )
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Run the server until Ctrl+C / SIGTERM
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr).await?;

        tracing::info!("Presence server listening on {}", listener.local_addr()?);
        tracing::info!("Connect to: ws://{}/ws/meetings/{{room_id}}?username=...", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Serve on an already bound listener until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
    }
}
