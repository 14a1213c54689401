//! snip Storage Backends
//!
//! Implementations of [`snip_core::DocumentStore`]:
//! - Memory (default): optimistic transactions over an in-process map
//! - SQLite: embedded persistence with database transactions

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

pub use snip_core::StorageError;
