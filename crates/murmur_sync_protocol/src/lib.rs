//! # murmur sync protocol
//!
//! What travels over the gossip overlay.
//!
//! This crate provides:
//! - [`EntityKind`] and its per-kind namespace
//! - [`RecordKey`], the `posts/<id>` style key a record is published under
//! - [`RemoteRecord`], the tagged inbound record, decoded and validated at
//!   the boundary before it reaches the store
//!
//! This is a pure protocol crate with no I/O operations.
//!
//! ## Example
//!
//! ```rust
//! use murmur_sync_protocol::{EntityKind, RecordKey};
//!
//! let key: RecordKey = "votes/0b1e6a8e-5a7c-4c9e-9a55-1f2b3c4d5e6f".parse().unwrap();
//! assert_eq!(key.kind, EntityKind::Vote);
//! assert_eq!(key.to_string(), "votes/0b1e6a8e-5a7c-4c9e-9a55-1f2b3c4d5e6f");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod key;
mod record;

pub use error::{ProtocolError, ProtocolResult};
pub use key::{EntityKind, RecordKey};
pub use record::{RemoteRecord, MAX_RECORD_SIZE};
