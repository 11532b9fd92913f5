//! Error types for tile blob store operations.

use thiserror::Error;

/// Result type alias using StorageError.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed cause carried by backend failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Primary error type for blob store operations.
///
/// "Not found" is deliberately absent: a missing object is reported through
/// `Option`/`bool` return values, never as an error.
#[derive(Debug, Error)]
pub enum StorageError {
    // === Caller Errors ===
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("Misuse: {0}")]
    Misuse(String),

    // === Backend Errors ===
    #[error("Storage error during {operation} of '{key}'")]
    Backend {
        operation: &'static str,
        key: String,
        #[source]
        source: BoxError,
    },

    #[error("Invalid layer metadata: {0}")]
    Metadata(String),

    // === Lifecycle Errors ===
    #[error("Blob store has been destroyed")]
    Destroyed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Wrap a transport failure with the operation name and object key.
    pub fn backend(
        operation: &'static str,
        key: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        StorageError::Backend {
            operation,
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        StorageError::InvalidArgument(message.into())
    }

    /// Whether the error was caused by the caller rather than the store.
    ///
    /// Caller errors are never worth retrying.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            StorageError::InvalidArgument(_)
                | StorageError::NotImplemented(_)
                | StorageError::Misuse(_)
                | StorageError::Config(_)
        )
    }
}

impl From<std::str::Utf8Error> for StorageError {
    fn from(err: std::str::Utf8Error) -> Self {
        StorageError::Metadata(format!("not valid UTF-8: {}", err))
    }
}
