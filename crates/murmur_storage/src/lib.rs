//! # murmur storage
//!
//! Append-only byte stores backing the replica journal.
//!
//! Backends are **opaque**: they know nothing about journal framing or
//! entity encoding. `murmur_core` owns the format; a backend only reads,
//! appends, flushes and truncates bytes.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral nodes and tests
//! - [`FileBackend`] - persistent journal file
//!
//! ## Example
//!
//! ```rust
//! use murmur_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"record").unwrap();
//! assert_eq!(backend.read_at(offset, 6).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
