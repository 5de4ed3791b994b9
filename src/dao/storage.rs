//! Backend-agnostic storage errors.

use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by gateway backends regardless of the underlying service.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human-readable reason.
        message: String,
        /// Transport error reported by the backend client.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend answered but the payload did not match the expected row shape.
    #[error("malformed `{collection}` row: {message}")]
    Decode {
        /// Collection whose row failed to decode.
        collection: &'static str,
        /// Decoder error.
        message: String,
    },
    /// The backend rejected a write (constraint, permission, missing row).
    #[error("`{collection}` write rejected: {message}")]
    Rejected {
        /// Collection the write targeted.
        collection: &'static str,
        /// Reason given by the backend.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a rejected-write error.
    pub fn rejected(collection: &'static str, message: impl Into<String>) -> Self {
        StorageError::Rejected {
            collection,
            message: message.into(),
        }
    }
}
