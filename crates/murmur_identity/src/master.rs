//! Device master key derivation.

use crate::error::{IdentityError, IdentityResult};
use crate::keys::KeyPair;
use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of the AES-256 master key in bytes.
pub const KEY_SIZE: usize = 32;

/// Fixed application salt for master key derivation.
///
/// The salt is constant so every device restoring the same key pair arrives
/// at the same master key without any extra state.
pub const MASTER_KEY_SALT: &[u8] = b"murmur/master-key/v1";

const HKDF_INFO: &[u8] = b"murmur-content-key-v1";

/// Parameters of the slow key-derivation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KdfParams {
    /// PBKDF2-HMAC-SHA256 iteration count.
    pub iterations: u32,
    /// Salt mixed into the derivation.
    pub salt: &'static [u8],
}

impl KdfParams {
    /// Default iteration count.
    pub const DEFAULT_ITERATIONS: u32 = 100_000;

    /// Creates the default parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            iterations: Self::DEFAULT_ITERATIONS,
            salt: MASTER_KEY_SALT,
        }
    }

    /// Sets the iteration count.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Cheap parameters for tests and doc examples. Not for production keys.
    #[must_use]
    pub const fn fast_for_tests() -> Self {
        Self::new().with_iterations(1_000)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Symmetric key used to encrypt the device owner's own content.
///
/// Never transmitted; zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    /// Derives the master key from a key pair's private half.
    ///
    /// The secret is stretched with PBKDF2-HMAC-SHA256 over the fixed salt,
    /// then expanded with HKDF-SHA256 under a content-key label. The result
    /// is a pure function of the key pair and `params`.
    ///
    /// # Errors
    ///
    /// Returns an error if the iteration count is zero or HKDF expansion fails.
    pub fn derive(key_pair: &KeyPair, params: &KdfParams) -> IdentityResult<Self> {
        if params.iterations == 0 {
            return Err(IdentityError::key_derivation_failed(
                "iteration count must be non-zero",
            ));
        }

        let secret = key_pair.secret_bytes();
        let mut stretched = Zeroizing::new([0u8; KEY_SIZE]);
        pbkdf2_hmac::<Sha256>(
            &secret[..],
            params.salt,
            params.iterations,
            &mut stretched[..],
        );

        let hk = Hkdf::<Sha256>::new(None, &stretched[..]);
        let mut bytes = [0u8; KEY_SIZE];
        hk.expand(HKDF_INFO, &mut bytes)
            .map_err(|_| IdentityError::key_derivation_failed("HKDF expand failed"))?;

        Ok(Self { bytes })
    }

    /// Returns the key bytes.
    #[must_use]
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
