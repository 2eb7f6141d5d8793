//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backing location does not exist or cannot be opened.
    #[error("storage unavailable at {path}: {reason}")]
    Unavailable {
        /// Location that was requested.
        path: PathBuf,
        /// Why it could not be used.
        reason: String,
    },

    /// Attempted to read beyond the end of storage.
    #[error("read beyond end of storage: offset {offset}, len {len}, size {size}")]
    ReadPastEnd {
        /// The requested read offset.
        offset: u64,
        /// The requested read length.
        len: usize,
        /// The current storage size.
        size: u64,
    },

    /// Truncation beyond the current size was requested.
    #[error("cannot truncate to {requested} bytes, storage holds {size}")]
    InvalidTruncate {
        /// Requested new size.
        requested: u64,
        /// Current size.
        size: u64,
    },
}

impl StorageError {
    /// Creates an unavailable error.
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
