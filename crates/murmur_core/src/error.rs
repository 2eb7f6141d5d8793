//! Error types for the replica store.

use crate::entity::{EntityId, TableKind};
use murmur_identity::IdentityError;
use murmur_storage::StorageError;
use thiserror::Error;

/// Result type for store operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in replica store operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The persistent store is missing or inaccessible.
    ///
    /// Fatal at startup; recoverable by retrying or reinitialising.
    #[error("store unavailable: {reason}")]
    StoreUnavailable {
        /// Why the store could not be used.
        reason: String,
    },

    /// Signing, verification or content crypto failed.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Storage backend error after the store was opened.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A referenced entity does not exist.
    #[error("{table} not found: {id}")]
    NotFound {
        /// Table that was searched.
        table: TableKind,
        /// The missing id.
        id: EntityId,
    },

    /// The operation is not valid for the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of the problem.
        message: String,
    },

    /// Journal record could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },

    /// Journal is corrupted beyond a torn trailing write.
    #[error("journal corruption at offset {offset}: {message}")]
    JournalCorruption {
        /// Byte offset of the bad frame.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },
}

impl CoreError {
    /// Creates a store unavailable error.
    pub fn store_unavailable(reason: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            reason: reason.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(table: TableKind, id: EntityId) -> Self {
        Self::NotFound { table, id }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Creates a journal corruption error.
    pub fn journal_corruption(offset: u64, message: impl Into<String>) -> Self {
        Self::JournalCorruption {
            offset,
            message: message.into(),
        }
    }

    /// Returns true for soft data-integrity failures.
    ///
    /// These drop the offending record and never take the node down.
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Identity(e) if e.is_integrity_failure())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CoreError::store_unavailable("disk gone");
        assert_eq!(err.to_string(), "store unavailable: disk gone");

        let id = EntityId::new();
        let err = CoreError::not_found(TableKind::Posts, id);
        assert_eq!(err.to_string(), format!("post not found: {id}"));

        let err = CoreError::journal_corruption(42, "bad magic");
        assert_eq!(
            err.to_string(),
            "journal corruption at offset 42: bad magic"
        );
    }

    #[test]
    fn integrity_classification() {
        assert!(CoreError::from(IdentityError::InvalidSignature).is_integrity_failure());
        assert!(CoreError::from(IdentityError::decryption_failed("tag")).is_integrity_failure());
        assert!(!CoreError::from(IdentityError::KeyNotInitialized).is_integrity_failure());
        assert!(!CoreError::store_unavailable("x").is_integrity_failure());
    }
}
