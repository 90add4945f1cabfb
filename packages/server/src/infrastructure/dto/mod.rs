//! Data Transfer Objects (DTOs) for the presence server.
//!
//! DTOs are organized by protocol:
//! - `websocket`: envelopes exchanged over a participant's WebSocket
//! - `http`: HTTP API request/response bodies

pub mod conversion;
pub mod http;
pub mod websocket;
