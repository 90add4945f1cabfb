//! Infrastructure 層: ライブ接続、ルーム、ブロードキャスト、ストアの変更フィード、
//! 通信用 DTO、ストア実装

pub mod change_bridge;
pub mod connection;
pub mod dto;
pub mod hub;
pub mod liveness;
pub mod registry;
pub mod repository;

pub use change_bridge::{ChangeBridge, RetryPolicy};
pub use connection::{Connection, ConnectionHandle, Outbound, spawn_writer};
pub use hub::BroadcastHub;
pub use liveness::{LivenessOutcome, LivenessPolicy};
pub use registry::{ConnectionRegistry, LiveRoom, Registration, Removal};
pub use repository::{BoundedMeetingStore, InMemoryMeetingStore};
