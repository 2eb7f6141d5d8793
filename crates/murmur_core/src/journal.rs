//! Append-only journal of committed table changes.
//!
//! ## Frame format
//!
//! ```text
//! ┌──────────┬──────────┬───────────────┬─────────────────────┐
//! │  magic   │  length  │   checksum    │ payload (CBOR)      │
//! │ (4 bytes)│ (4 bytes)│   (8 bytes)   │ (length bytes)      │
//! └──────────┴──────────┴───────────────┴─────────────────────┘
//! ```
//!
//! - `magic`: `MRJ1`
//! - `length`: little-endian payload length
//! - `checksum`: first 8 bytes of SHA-256 over the payload
//! - `payload`: one committed batch, `Vec<JournalRecord>`
//!
//! A batch is the unit of atomicity: replay applies a frame whole or not
//! at all.

use crate::entity::{EntityId, TableKind};
use crate::error::{CoreError, CoreResult};
use crate::tables::Row;
use murmur_storage::StorageBackend;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Frame magic.
pub const MAGIC: [u8; 4] = *b"MRJ1";

/// Bytes before the payload.
pub const HEADER_SIZE: usize = 16;

/// One change to a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    /// Insert or replace a row.
    Put(Row),
    /// Delete a row.
    Delete {
        /// Table to delete from.
        table: TableKind,
        /// Primary key.
        id: EntityId,
    },
}

/// Outcome of replaying a journal.
#[derive(Debug, Default)]
pub struct Replay {
    /// Committed batches in order.
    pub batches: Vec<Vec<JournalRecord>>,
    /// Bytes cut off a torn trailing frame, if any.
    pub truncated_bytes: u64,
}

/// Journal writer and reader over a storage backend.
pub struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_write: bool,
}

impl Journal {
    /// Wraps a backend.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend,
            sync_on_write,
        }
    }

    /// Reads every committed batch.
    ///
    /// A torn trailing frame (the remains of an interrupted append) is
    /// truncated away and reported in [`Replay::truncated_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::JournalCorruption`] for damage anywhere other
    /// than the tail, and storage errors from the backend.
    pub fn replay(&mut self) -> CoreResult<Replay> {
        let data = self.backend.read_all()?;
        let total = data.len();
        let mut replay = Replay::default();
        let mut offset = 0usize;

        while offset < total {
            let remaining = total - offset;
            if remaining < HEADER_SIZE {
                return self.cut_tail(replay, offset, total);
            }

            let header = &data[offset..offset + HEADER_SIZE];
            if header[..4] != MAGIC {
                return Err(CoreError::journal_corruption(offset as u64, "bad frame magic"));
            }
            let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
            let end = offset + HEADER_SIZE + len;
            if end > total {
                return self.cut_tail(replay, offset, total);
            }

            let payload = &data[offset + HEADER_SIZE..end];
            if checksum(payload) != header[8..16] {
                if end == total {
                    return self.cut_tail(replay, offset, total);
                }
                return Err(CoreError::journal_corruption(offset as u64, "checksum mismatch"));
            }

            let batch: Vec<JournalRecord> = ciborium::de::from_reader(payload).map_err(|e| {
                CoreError::journal_corruption(offset as u64, format!("undecodable batch: {e}"))
            })?;
            replay.batches.push(batch);
            offset = end;
        }

        Ok(replay)
    }

    fn cut_tail(&mut self, mut replay: Replay, offset: usize, total: usize) -> CoreResult<Replay> {
        let torn = (total - offset) as u64;
        tracing::warn!(offset, bytes = torn, "truncating torn journal tail");
        self.backend.truncate(offset as u64)?;
        replay.truncated_bytes = torn;
        Ok(replay)
    }

    /// Appends one committed batch.
    ///
    /// On any backend failure the journal is cut back to its previous size,
    /// so a failed batch is never replayed and later frames start on a
    /// clean boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend write fails. Nothing is
    /// considered committed unless this returns `Ok`.
    pub fn append(&mut self, batch: &[JournalRecord]) -> CoreResult<()> {
        let frame = encode_frame(batch)?;
        let start = self.backend.size()?;
        if let Err(e) = self.write_frame(&frame) {
            if let Err(undo) = self.backend.truncate(start) {
                tracing::error!(
                    offset = start,
                    error = %undo,
                    "could not cut back failed journal append"
                );
            }
            return Err(e);
        }
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> CoreResult<()> {
        self.backend.append(frame)?;
        self.backend.flush()?;
        if self.sync_on_write {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Replaces the whole journal with a single batch.
    ///
    /// Used for compaction: deleted rows and superseded versions leave no
    /// bytes behind. The swap is atomic, so a crash leaves either the old
    /// journal or the new one.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend replace fails; the old
    /// journal is then still in place.
    pub fn rewrite(&mut self, batch: &[JournalRecord]) -> CoreResult<()> {
        let frame = if batch.is_empty() {
            Vec::new()
        } else {
            encode_frame(batch)?
        };
        self.backend.replace(&frame)?;
        Ok(())
    }

    /// Current journal size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}

/// Encodes a batch into a complete frame.
///
/// # Errors
///
/// Returns a codec error if the batch cannot be serialized or exceeds the
/// 4-byte length field.
pub fn encode_frame(batch: &[JournalRecord]) -> CoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::ser::into_writer(batch, &mut payload)
        .map_err(|e| CoreError::codec(format!("journal encode: {e}")))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::codec("journal batch exceeds 4 GiB"))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&checksum(&payload));
    frame.extend_from_slice(&payload);
    Ok(frame)
}

fn checksum(payload: &[u8]) -> [u8; 8] {
    let digest = Sha256::digest(payload);
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}
