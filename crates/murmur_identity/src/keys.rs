//! Ed25519 identity keys and signatures.

use crate::error::{IdentityError, IdentityResult};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Size of an encoded public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;
/// Size of an encoded signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// The durable pseudonymous identity of a participant.
///
/// Rendered as 64 lowercase hex characters on the wire and in logs.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Creates a public key from raw bytes.
    ///
    /// The bytes are not checked to be a valid curve point here; that
    /// happens at verification time so malformed keys simply fail to verify.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn verifying_key(&self) -> IdentityResult<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| IdentityError::invalid_key(e.to_string()))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| IdentityError::invalid_key(e.to_string()))?;
        let bytes: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            IdentityError::invalid_key(format!(
                "expected {PUBLIC_KEY_SIZE} bytes, got {}",
                v.len()
            ))
        })?;
        Ok(Self(bytes))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A detached Ed25519 signature over a canonical payload.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    /// Creates a signature from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Returns the lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}..)", &hex[..16])
    }
}

impl FromStr for Signature {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| IdentityError::InvalidSignature)?;
        let bytes: [u8; SIGNATURE_SIZE] = bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidSignature)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// An Ed25519 signing key pair.
///
/// The private half never leaves the owning device; it is zeroized on drop
/// and redacted from `Debug` output.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    public: PublicKey,
}

impl KeyPair {
    /// Generates a fresh key pair from OS randomness.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError::CryptoUnsupported`] if the platform cannot
    /// supply secure randomness.
    pub fn generate() -> IdentityResult<Self> {
        let mut seed = Zeroizing::new([0u8; 32]);
        OsRng
            .try_fill_bytes(&mut seed[..])
            .map_err(|e| IdentityError::crypto_unsupported(format!("OS randomness: {e}")))?;
        Ok(Self::from_seed(&seed))
    }

    /// Restores a key pair from its 32-byte secret.
    ///
    /// # Errors
    ///
    /// Returns an error if `bytes` is not exactly 32 bytes long.
    pub fn from_secret_bytes(bytes: &[u8]) -> IdentityResult<Self> {
        let seed: [u8; 32] = bytes.try_into().map_err(|_| {
            IdentityError::invalid_key(format!("expected 32 secret bytes, got {}", bytes.len()))
        })?;
        let seed = Zeroizing::new(seed);
        Ok(Self::from_seed(&seed))
    }

    /// Restores a key pair from the hex export produced by [`secret_hex`](Self::secret_hex).
    pub fn from_secret_hex(text: &str) -> IdentityResult<Self> {
        let bytes = Zeroizing::new(
            hex::decode(text.trim()).map_err(|e| IdentityError::invalid_key(e.to_string()))?,
        );
        Self::from_secret_bytes(&bytes)
    }

    fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let public = PublicKey(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            public,
        }
    }

    /// Returns the public identity.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Returns the secret key bytes.
    ///
    /// # Security
    ///
    /// Only used as key-derivation input and for the external backup flow.
    /// Never log or transmit the result.
    #[must_use]
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// Exports the secret as hex for the external key-backup flow.
    #[must_use]
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(&self.secret_bytes()[..]))
    }

    /// Signs a canonical payload.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> Signature {
        Signature(self.signing_key.sign(payload).to_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Signs `payload` with the private half of `key_pair`.
#[must_use]
pub fn sign(payload: &[u8], key_pair: &KeyPair) -> Signature {
    key_pair.sign(payload)
}

/// Verifies `signature` over `payload` against `public_key`.
///
/// Returns `false` for malformed keys as well as for mismatching signatures;
/// callers treat both the same way.
#[must_use]
pub fn verify(payload: &[u8], signature: &Signature, public_key: &PublicKey) -> bool {
    let Ok(verifying_key) = public_key.verifying_key() else {
        return false;
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(payload, &signature).is_ok()
}
