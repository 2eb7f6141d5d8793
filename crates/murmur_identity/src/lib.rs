//! # murmur identity
//!
//! Identity and signing primitives for the murmur replica.
//!
//! This crate provides:
//! - Ed25519 key pairs whose public half is the durable pseudonymous identity
//! - A deterministic canonical payload encoding used as signing input
//! - A per-device master key derived from the private key (PBKDF2 + HKDF)
//! - AES-256-GCM content envelopes keyed off that master key
//!
//! There is no process-wide key state. A [`Session`] owns the key pair and
//! its derived master key and is passed explicitly to every operation that
//! needs to sign, encrypt or decrypt.
//!
//! ## Usage
//!
//! ```
//! use murmur_identity::{verify, CanonicalPayload, KdfParams, Session};
//!
//! let session = Session::generate(&KdfParams::fast_for_tests()).unwrap();
//!
//! let envelope = session.encrypt(b"hello").unwrap();
//! assert_eq!(session.decrypt(&envelope).unwrap(), b"hello");
//!
//! let payload = CanonicalPayload::new("post").text("id", "p1").finish();
//! let signature = session.sign(&payload);
//! assert!(verify(&payload, &signature, &session.public_key()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod canonical;
mod envelope;
mod error;
mod hex_serde;
mod keys;
mod master;
mod session;

pub use canonical::{CanonicalPayload, CanonicalValue};
pub use envelope::{ContentCipher, Envelope, NONCE_SIZE, TAG_SIZE};
pub use error::{IdentityError, IdentityResult};
pub use keys::{sign, verify, KeyPair, PublicKey, Signature, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
pub use master::{KdfParams, MasterKey, KEY_SIZE, MASTER_KEY_SALT};
pub use session::Session;
