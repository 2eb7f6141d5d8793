//! Error types for identity and signing operations.

use thiserror::Error;

/// Result type for identity operations.
pub type IdentityResult<T> = Result<T, IdentityError>;

/// Errors that can occur while generating keys, signing or handling envelopes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The platform cannot provide a required primitive (e.g. no OS randomness).
    #[error("cryptographic primitive unavailable: {message}")]
    CryptoUnsupported {
        /// Description of the missing primitive.
        message: String,
    },

    /// Encrypt or decrypt was attempted before the master key was derived.
    #[error("master key not initialized")]
    KeyNotInitialized,

    /// Encryption failed.
    #[error("encryption failed: {message}")]
    EncryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// Decryption failed (authentication tag mismatch or bad key material).
    #[error("decryption failed: {message}")]
    DecryptionFailed {
        /// Description of the failure.
        message: String,
    },

    /// A signature did not verify against its payload and public key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Key bytes or their textual encoding are malformed.
    #[error("invalid key material: {message}")]
    InvalidKey {
        /// Description of the problem.
        message: String,
    },

    /// Key derivation failed.
    #[error("key derivation failed: {message}")]
    KeyDerivationFailed {
        /// Description of the failure.
        message: String,
    },
}

impl IdentityError {
    /// Creates a crypto unsupported error.
    pub fn crypto_unsupported(message: impl Into<String>) -> Self {
        Self::CryptoUnsupported {
            message: message.into(),
        }
    }

    /// Creates an encryption failed error.
    pub fn encryption_failed(message: impl Into<String>) -> Self {
        Self::EncryptionFailed {
            message: message.into(),
        }
    }

    /// Creates a decryption failed error.
    pub fn decryption_failed(message: impl Into<String>) -> Self {
        Self::DecryptionFailed {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Creates a key derivation failed error.
    pub fn key_derivation_failed(message: impl Into<String>) -> Self {
        Self::KeyDerivationFailed {
            message: message.into(),
        }
    }

    /// Returns true for data-integrity failures.
    ///
    /// Integrity failures are soft: the offending record is dropped and the
    /// node keeps running.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::DecryptionFailed { .. } | Self::InvalidSignature | Self::InvalidKey { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_classification() {
        assert!(IdentityError::InvalidSignature.is_integrity_failure());
        assert!(IdentityError::decryption_failed("tag").is_integrity_failure());
        assert!(!IdentityError::KeyNotInitialized.is_integrity_failure());
        assert!(!IdentityError::crypto_unsupported("no rng").is_integrity_failure());
    }

    #[test]
    fn error_display() {
        let err = IdentityError::KeyNotInitialized;
        assert_eq!(err.to_string(), "master key not initialized");

        let err = IdentityError::decryption_failed("tag mismatch");
        assert!(err.to_string().contains("tag mismatch"));
    }
}
