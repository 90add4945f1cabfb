//! Realtime presence and broadcast layer for meeting rooms.
//!
//! Participants hold one WebSocket each. The server keeps track of who is
//! live in which room, relays control-plane events between them, and
//! mirrors meeting store updates to every connected participant.

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
