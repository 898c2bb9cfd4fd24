use hub_storage::StorageError;
use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by [`crate::Store`]
///
/// A persistence error is returned after the in-memory change has already
/// been applied and announced.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("destination definition not found: {0}")]
    DestinationNotFound(String),

    #[error("unknown area: {0}")]
    UnknownArea(String),
}
