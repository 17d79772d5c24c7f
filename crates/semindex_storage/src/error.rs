//! Error types for metadata storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stored record could not be decoded.
    #[error("metadata record corrupted: {0}")]
    Corrupted(String),

    /// A record could not be encoded.
    #[error("metadata encoding failed: {0}")]
    Encoding(String),

    /// The index id cannot be used as a record key.
    #[error("invalid index id: {0:?}")]
    InvalidId(String),

    /// Another process holds the metadata directory.
    #[error("metadata directory locked: another process has exclusive access")]
    Locked,

    /// The metadata directory does not exist or is not a directory.
    #[error("metadata directory not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            StorageError::Locked.to_string(),
            "metadata directory locked: another process has exclusive access"
        );
        assert!(StorageError::InvalidId("../x".into())
            .to_string()
            .contains("../x"));
    }

    #[test]
    fn io_error_converts() {
        let err: StorageError = io::Error::other("boom").into();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
