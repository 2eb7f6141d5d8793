//! Error types for the sync engine.

use murmur_core::CoreError;
use murmur_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The overlay could not take a record. The local copy is unaffected.
    #[error("publish of {key} failed: {message}")]
    PublishFailed {
        /// Key the record was published under.
        key: String,
        /// Underlying failure.
        message: String,
    },

    /// The overlay is unreachable or the engine has disconnected.
    #[error("not connected to the overlay")]
    NotConnected,

    /// Wire encoding or decoding failed.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The local store failed.
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    /// Invalid state transition.
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        /// Current state.
        from: String,
        /// Attempted target state.
        to: String,
    },

    /// The async runtime is missing or refused a task.
    #[error("runtime error: {message}")]
    Runtime {
        /// Error message.
        message: String,
    },
}

impl SyncError {
    /// Creates a publish failure for `key`.
    pub fn publish_failed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PublishFailed {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Returns true if the operation may succeed when tried again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::PublishFailed { .. } | SyncError::NotConnected => true,
            SyncError::Store(e) => matches!(e, CoreError::StoreUnavailable { .. }),
            _ => false,
        }
    }
}
