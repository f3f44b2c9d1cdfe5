//! message-board/crates/domains/src/lib.rs
//!
//! The central domain types and port definitions for the message board.
//! Nothing in this crate performs I/O; adapters implement the ports.

pub mod errors;
pub mod models;
pub mod ports;
pub mod query;
pub mod timestamp;

// Re-exporting for easier access in other crates
pub use errors::*;
pub use models::*;
pub use ports::*;
pub use query::*;
