//! Encrypted content envelopes (AES-256-GCM).

use crate::canonical::CanonicalValue;
use crate::error::{IdentityError, IdentityResult};
use crate::master::MasterKey;
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// An encrypted content payload.
///
/// `ciphertext` includes the trailing GCM tag. `wrapped_key` is carried and
/// signed but never produced locally; it is reserved for a per-item key
/// scheme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Ciphertext with appended authentication tag.
    #[serde(with = "crate::hex_serde")]
    pub ciphertext: Vec<u8>,
    /// Initialization vector (GCM nonce).
    #[serde(with = "crate::hex_serde")]
    pub iv: Vec<u8>,
    /// Optional wrapped per-item key.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::hex_serde::option"
    )]
    pub wrapped_key: Option<Vec<u8>>,
}

impl Envelope {
    /// Returns the envelope as a canonical map for signing.
    #[must_use]
    pub fn canonical(&self) -> CanonicalValue {
        CanonicalValue::Map(vec![
            (
                "ciphertext".to_string(),
                CanonicalValue::Bytes(self.ciphertext.clone()),
            ),
            ("iv".to_string(), CanonicalValue::Bytes(self.iv.clone())),
            (
                "wrapped_key".to_string(),
                self.wrapped_key
                    .clone()
                    .map_or(CanonicalValue::Null, CanonicalValue::Bytes),
            ),
        ])
    }
}

/// Encrypts and decrypts envelopes under one master key.
pub struct ContentCipher {
    cipher: Aes256Gcm,
}

impl ContentCipher {
    /// Creates a cipher for the given master key.
    #[must_use]
    pub fn new(key: &MasterKey) -> Self {
        // MasterKey is always exactly 32 bytes, matching AES-256.
        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_bytes()));
        Self { cipher }
    }

    /// Encrypts `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> IdentityResult<Envelope> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|e| IdentityError::crypto_unsupported(format!("OS randomness: {e}")))?;

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| IdentityError::encryption_failed("AES-GCM encryption error"))?;

        Ok(Envelope {
            ciphertext,
            iv: nonce_bytes.to_vec(),
            wrapped_key: None,
        })
    }

    /// Decrypts an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::DecryptionFailed`] on a malformed nonce, a
    /// truncated ciphertext or an authentication tag mismatch (which is also
    /// what a foreign identity's envelope produces).
    pub fn decrypt(&self, envelope: &Envelope) -> IdentityResult<Vec<u8>> {
        if envelope.iv.len() != NONCE_SIZE {
            return Err(IdentityError::decryption_failed(format!(
                "nonce must be {NONCE_SIZE} bytes, got {}",
                envelope.iv.len()
            )));
        }
        if envelope.ciphertext.len() < TAG_SIZE {
            return Err(IdentityError::decryption_failed("ciphertext too short"));
        }
        if envelope.wrapped_key.is_some() {
            return Err(IdentityError::decryption_failed(
                "wrapped per-item keys are not supported",
            ));
        }

        self.cipher
            .decrypt(Nonce::from_slice(&envelope.iv), envelope.ciphertext.as_slice())
            .map_err(|_| IdentityError::decryption_failed("authentication tag mismatch"))
    }
}

impl std::fmt::Debug for ContentCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;
    use crate::master::KdfParams;
    use proptest::prelude::*;

    fn cipher() -> ContentCipher {
        let pair = KeyPair::generate().unwrap();
        ContentCipher::new(&MasterKey::derive(&pair, &KdfParams::fast_for_tests()).unwrap())
    }

    #[test]
    fn fresh_nonce_per_call() {
        let c = cipher();
        let a = c.encrypt(b"same").unwrap();
        let b = c.encrypt(b"same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let c = cipher();
        let mut envelope = c.encrypt(b"secret").unwrap();
        envelope.ciphertext[0] ^= 0xff;
        assert!(matches!(
            c.decrypt(&envelope),
            Err(IdentityError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn foreign_key_fails() {
        let envelope = cipher().encrypt(b"secret").unwrap();
        assert!(matches!(
            cipher().decrypt(&envelope),
            Err(IdentityError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn bad_nonce_length_fails() {
        let c = cipher();
        let mut envelope = c.encrypt(b"secret").unwrap();
        envelope.iv.pop();
        assert!(c.decrypt(&envelope).is_err());
    }

    #[test]
    fn wire_shape_is_hex() {
        let envelope = Envelope {
            ciphertext: vec![0xde, 0xad],
            iv: vec![0x01],
            wrapped_key: None,
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert_eq!(json, r#"{"ciphertext":"dead","iv":"01"}"#);
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, envelope);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn roundtrip(s in "\\PC{0,1000}") {
            let c = cipher();
            let envelope = c.encrypt(s.as_bytes()).unwrap();
            let plain = c.decrypt(&envelope).unwrap();
            prop_assert_eq!(String::from_utf8(plain).unwrap(), s);
        }
    }
}
