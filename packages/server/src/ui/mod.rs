//! UI 層: axum のルーター、WebSocket / HTTP ハンドラ、共有状態

pub mod handler;
pub mod server;
pub mod signal;
pub mod state;

pub use server::Server;
pub use state::AppState;
