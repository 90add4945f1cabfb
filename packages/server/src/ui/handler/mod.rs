//! Request handlers

pub mod http;
pub mod websocket;

pub use http::{
    debug_live_rooms, debug_register_session, get_meeting_info, health_check, leave_meeting,
    notify_tracks_ready,
};
pub use websocket::websocket_handler;
