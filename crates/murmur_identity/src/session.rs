//! Explicit identity session.

use crate::envelope::{ContentCipher, Envelope};
use crate::error::{IdentityError, IdentityResult};
use crate::keys::{KeyPair, PublicKey, Signature};
use crate::master::{KdfParams, MasterKey};
use std::sync::OnceLock;

/// The key context of one local identity.
///
/// A session owns the key pair and, once derived, the device master key.
/// It is passed explicitly to every signing and content operation, so there
/// is no global initialization order to get wrong. Share it across tasks
/// behind an `Arc`.
pub struct Session {
    key_pair: KeyPair,
    cipher: OnceLock<ContentCipher>,
}

impl Session {
    /// Generates a new identity and derives its master key.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::CryptoUnsupported`] if no secure randomness
    /// is available, or a derivation error.
    pub fn generate(params: &KdfParams) -> IdentityResult<Self> {
        let session = Self::new(KeyPair::generate()?);
        session.derive_master_key(params)?;
        tracing::info!(public_key = %session.public_key(), "generated new identity");
        Ok(session)
    }

    /// Opens a session for a loaded or restored key pair, deriving the
    /// master key up front.
    pub fn open(key_pair: KeyPair, params: &KdfParams) -> IdentityResult<Self> {
        let session = Self::new(key_pair);
        session.derive_master_key(params)?;
        Ok(session)
    }

    /// Creates a session without deriving the master key.
    ///
    /// Signing works immediately; encrypt and decrypt fail with
    /// [`IdentityError::KeyNotInitialized`] until
    /// [`derive_master_key`](Self::derive_master_key) has run.
    #[must_use]
    pub fn new(key_pair: KeyPair) -> Self {
        Self {
            key_pair,
            cipher: OnceLock::new(),
        }
    }

    /// Derives and activates the master key. Idempotent.
    pub fn derive_master_key(&self, params: &KdfParams) -> IdentityResult<()> {
        if self.cipher.get().is_some() {
            return Ok(());
        }
        let key = MasterKey::derive(&self.key_pair, params)?;
        // A concurrent caller may have won the race; both derived the same key.
        let _ = self.cipher.set(ContentCipher::new(&key));
        tracing::debug!(public_key = %self.public_key(), "master key derived");
        Ok(())
    }

    /// Returns true once the master key is available.
    #[must_use]
    pub fn has_master_key(&self) -> bool {
        self.cipher.get().is_some()
    }

    /// Returns the public identity.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.key_pair.public_key()
    }

    /// Returns the key pair.
    #[must_use]
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Signs a canonical payload.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> Signature {
        self.key_pair.sign(payload)
    }

    /// Encrypts content under this identity's master key.
    pub fn encrypt(&self, plaintext: &[u8]) -> IdentityResult<Envelope> {
        self.cipher()?.encrypt(plaintext)
    }

    /// Decrypts content encrypted under this identity's master key.
    pub fn decrypt(&self, envelope: &Envelope) -> IdentityResult<Vec<u8>> {
        self.cipher()?.decrypt(envelope)
    }

    fn cipher(&self) -> IdentityResult<&ContentCipher> {
        self.cipher.get().ok_or(IdentityError::KeyNotInitialized)
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("public_key", &self.public_key())
            .field("master_key", &self.has_master_key())
            .finish()
    }
}
