use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by session stores regardless of the backing medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What was being attempted.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored record could not be encoded or decoded.
    #[error("stored record is corrupted: {message}")]
    Corrupted {
        /// Which record was affected.
        message: String,
        /// Encoding failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
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

    /// Construct an error for a record that exists but cannot be decoded.
    pub fn corrupted(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Corrupted {
            message,
            source: Box::new(source),
        }
    }
}
