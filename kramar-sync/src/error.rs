//! Error types for the sync layer.

use kramar_storage::StorageError;
use kramar_types::Category;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while pairing, connecting or exchanging data.
///
/// Every variant is a typed failure reason; rendering it for the user is the
/// caller's job.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No Bluetooth capability and no touch fallback.
    #[error("proximity sync is not supported on this device: {0}")]
    Unsupported(String),

    /// The device picker was dismissed or no matching peer was found.
    #[error("device discovery cancelled: {0}")]
    DiscoveryCancelled(String),

    /// The GATT connection was rejected or could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The link dropped.
    #[error("peer disconnected")]
    Disconnected,

    /// A characteristic write failed.
    #[error("transmission failed: {0}")]
    Transmission(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Protocol error (unexpected or malformed message).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Neither outgoing nor incoming categories were selected.
    #[error("select at least one category to send or receive")]
    EmptySelection,

    /// The category has no local data to offer.
    #[error("no local data for category {0}")]
    CategoryUnavailable(Category),

    /// Operation not allowed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The session was exited or replaced while the operation was pending.
    #[error("session cancelled")]
    Cancelled,

    /// Timeout.
    #[error("operation timed out")]
    Timeout,
}

impl SyncError {
    /// Whether the error means the link is gone.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, SyncError::Disconnected)
    }
}
