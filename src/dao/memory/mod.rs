mod seed;
mod store;

pub use seed::classic_catalog;
pub use store::MemoryGateway;

use thiserror::Error;

use crate::dao::storage::StorageError;

/// Failures raised by the in-process gateway.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline (used to exercise degraded paths).
    #[error("in-memory store is offline")]
    Offline,
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
