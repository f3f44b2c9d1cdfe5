//! # storage-adapters
//!
//! Implementations of the `DocumentStore` port.
//!
//! - [`MemoryStore`]: always compiled, supports both layouts
//! - [`PostgresStore`]: shared-table layout over JSONB (feature `db-postgres`)

pub mod memory;
#[cfg(feature = "db-postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "db-postgres")]
pub use postgres::PostgresStore;
