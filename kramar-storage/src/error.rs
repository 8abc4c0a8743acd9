//! Error types for the storage layer.

use crate::Collection;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An operation ran before `init()`.
    #[error("database not initialized")]
    NotInitialized,

    /// The record lacks the collection's declared key field.
    #[error("record for {collection} has no string `{field}` key")]
    MissingKey {
        collection: Collection,
        field: &'static str,
    },

    /// Unknown collection name.
    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    /// A blocking storage task failed to complete.
    #[error("storage task failed: {0}")]
    Task(String),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
