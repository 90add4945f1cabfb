//! Utilities shared by the Kaigi binaries: logging setup and clock helpers.

pub mod logger;
pub mod time;
