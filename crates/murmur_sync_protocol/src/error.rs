//! Protocol error types.

use crate::key::EntityKind;
use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding or validating wire records.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The record key is not of the form `<namespace>/<id>`.
    #[error("invalid record key {key:?}: {reason}")]
    InvalidKey {
        /// The offending key.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The payload does not parse as the kind its key names.
    #[error("malformed {kind} record: {message}")]
    Malformed {
        /// Kind named by the key.
        kind: EntityKind,
        /// Parser message.
        message: String,
    },

    /// The key's id differs from the id inside the payload.
    #[error("key names {key_id} but payload carries {payload_id}")]
    IdMismatch {
        /// Id in the key.
        key_id: String,
        /// Id in the payload.
        payload_id: String,
    },

    /// The payload exceeds [`MAX_RECORD_SIZE`](crate::MAX_RECORD_SIZE).
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    TooLarge {
        /// Payload size.
        size: usize,
        /// Limit.
        max: usize,
    },

    /// A record could not be serialized.
    #[error("encode failed: {message}")]
    Encode {
        /// Serializer message.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Creates a malformed record error.
    pub fn malformed(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Malformed {
            kind,
            message: message.into(),
        }
    }
}
