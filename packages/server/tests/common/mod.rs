//! Test harness: an in-process server on an ephemeral port plus small
//! WebSocket / HTTP client helpers.

#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use kaigi_server::{
    config::SessionSettings,
    infrastructure::{InMemoryMeetingStore, LivenessPolicy},
    ui::{AppState, Server},
};
use kaigi_shared::time::SystemClock;
use serde_json::{Value, json};
use tokio::{net::TcpStream, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for an expected frame
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// Short liveness window so that expiry tests finish quickly
pub fn fast_settings() -> SessionSettings {
    SessionSettings {
        liveness: LivenessPolicy {
            ping_interval: Duration::from_millis(150),
            timeout: Duration::from_millis(750),
        },
        ..SessionSettings::default()
    }
}

/// Helper struct to manage the server lifecycle
pub struct TestServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<std::io::Result<()>>,
    http: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(fast_settings()).await
    }

    pub async fn start_with(settings: SessionSettings) -> Self {
        let clock = Arc::new(SystemClock);
        let store = Arc::new(InMemoryMeetingStore::new(clock.clone()));
        let state = AppState::new(store, clock, settings);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let (shutdown, signal) = oneshot::channel::<()>();
        let task = tokio::spawn(Server::new(state).serve(listener, async move {
            let _ = signal.await;
        }));

        Self {
            addr,
            shutdown: Some(shutdown),
            task,
            http: reqwest::Client::new(),
        }
    }

    pub fn ws_url(&self, room_id: &str, username: &str) -> String {
        format!(
            "ws://{}/ws/meetings/{}?username={}",
            self.addr, room_id, username
        )
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Seed a session record through the debug endpoint
    pub async fn seed_session(&self, room_id: &str, username: &str, session_id: &str) {
        let response = self
            .post(
                &format!("/debug/meetings/{room_id}/sessions"),
                json!({"username": username, "session_id": session_id}),
            )
            .await;
        assert_eq!(response.status(), 201, "seeding {username} failed");
    }

    pub async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.http
            .post(self.http_url(path))
            .json(&body)
            .send()
            .await
            .expect("HTTP request failed")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(self.http_url(path))
            .send()
            .await
            .expect("HTTP request failed")
    }

    /// Connect and consume the initial `room_state`
    pub async fn join(&self, room_id: &str, username: &str) -> (WsClient, Value) {
        let (mut ws, _) = connect_async(self.ws_url(room_id, username))
            .await
            .expect("WebSocket connect failed");
        let room_state = next_json(&mut ws).await;
        assert_eq!(room_state["type"], "room_state");
        (ws, room_state)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.abort();
    }
}

pub async fn send_json(ws: &mut WsClient, value: Value) {
    ws.send(Message::text(value.to_string()))
        .await
        .expect("WebSocket send failed");
}

/// Next JSON envelope within `timeout`, skipping control frames
pub async fn try_next_json(ws: &mut WsClient, timeout: Duration) -> Option<Value> {
    let read = async {
        while let Some(message) = ws.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    return Some(serde_json::from_str(text.as_str()).expect("invalid JSON frame"));
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    };
    tokio::time::timeout(timeout, read).await.ok().flatten()
}

pub async fn next_json(ws: &mut WsClient) -> Value {
    try_next_json(ws, RECV_TIMEOUT)
        .await
        .expect("no envelope received in time")
}

/// Next envelope of the given type, skipping any others
pub async fn next_of_type(ws: &mut WsClient, kind: &str) -> Value {
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        let envelope = try_next_json(ws, remaining)
            .await
            .unwrap_or_else(|| panic!("no '{kind}' envelope received in time"));
        if envelope["type"] == kind {
            return envelope;
        }
    }
}
