//! Meeting Store の実装
//!
//! - `inmemory`: 変更フィード付きのプロセス内ストア
//! - `bounded`: すべての呼び出しに期限を付けるデコレータ

pub mod bounded;
pub mod inmemory;

pub use bounded::BoundedMeetingStore;
pub use inmemory::InMemoryMeetingStore;
