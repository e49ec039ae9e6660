use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// An optimistic write kept conflicting with concurrent writers.
    #[error("storage contention on `{key}` after {attempts} attempt(s)")]
    Contention { key: String, attempts: u32 },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a contention error for a key that could not be written.
    pub fn contention(key: impl Into<String>, attempts: u32) -> Self {
        StorageError::Contention {
            key: key.into(),
            attempts,
        }
    }
}
