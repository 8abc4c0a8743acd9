//! Keyed document storage for Kramar.
//!
//! Provides the persistent store every other component reads and writes.
//!
//! # Architecture
//!
//! - Records are JSON documents grouped into named [`Collection`]s
//! - Each collection declares the field records are upserted by (`id` or `userId`)
//! - Partner-namespaced collections are kept apart from the local user's own
//! - [`MemoryStore`] backs tests; [`SqliteStore`] persists to disk

mod collection;
mod error;
mod memory;
mod sqlite;
mod store;
pub mod version;

pub use collection::Collection;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use store::{PersistentStore, StoreExt};
pub use version::VersionTracker;
