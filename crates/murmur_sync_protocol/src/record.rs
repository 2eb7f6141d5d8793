//! Tagged wire records.

use crate::error::{ProtocolError, ProtocolResult};
use crate::key::{EntityKind, RecordKey};
use murmur_core::{Comment, EntityId, Post, Vote};

/// Largest payload accepted from the overlay.
pub const MAX_RECORD_SIZE: usize = 256 * 1024;

/// A replicated record, tagged by kind.
///
/// The payload is the JSON form of the entity schema; binary fields are
/// lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteRecord {
    /// A post.
    Post(Post),
    /// A comment.
    Comment(Comment),
    /// A vote.
    Vote(Vote),
}

impl RemoteRecord {
    /// The record's kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Post(_) => EntityKind::Post,
            Self::Comment(_) => EntityKind::Comment,
            Self::Vote(_) => EntityKind::Vote,
        }
    }

    /// The record's id.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Post(p) => p.id,
            Self::Comment(c) => c.id,
            Self::Vote(v) => v.id,
        }
    }

    /// The key the record is published under.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.kind(), self.id())
    }

    /// Serializes the payload.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let result = match self {
            Self::Post(p) => serde_json::to_vec(p),
            Self::Comment(c) => serde_json::to_vec(c),
            Self::Vote(v) => serde_json::to_vec(v),
        };
        result.map_err(|e| ProtocolError::Encode {
            message: e.to_string(),
        })
    }

    /// Decodes and validates a payload delivered under `key`.
    ///
    /// The payload must parse as the kind the key's namespace names, must
    /// carry the key's id and must not exceed [`MAX_RECORD_SIZE`]. Signature
    /// checks happen later, in the store.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TooLarge`], [`ProtocolError::Malformed`] or
    /// [`ProtocolError::IdMismatch`].
    pub fn decode(key: &RecordKey, bytes: &[u8]) -> ProtocolResult<Self> {
        if bytes.len() > MAX_RECORD_SIZE {
            return Err(ProtocolError::TooLarge {
                size: bytes.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let parsed = match key.kind {
            EntityKind::Post => serde_json::from_slice(bytes).map(Self::Post),
            EntityKind::Comment => serde_json::from_slice(bytes).map(Self::Comment),
            EntityKind::Vote => serde_json::from_slice(bytes).map(Self::Vote),
        };
        let record = parsed.map_err(|e| ProtocolError::malformed(key.kind, e.to_string()))?;

        if record.id() != key.id {
            return Err(ProtocolError::IdMismatch {
                key_id: key.id.to_string(),
                payload_id: record.id().to_string(),
            });
        }
        Ok(record)
    }
}

impl From<Post> for RemoteRecord {
    fn from(post: Post) -> Self {
        Self::Post(post)
    }
}

impl From<Comment> for RemoteRecord {
    fn from(comment: Comment) -> Self {
        Self::Comment(comment)
    }
}

impl From<Vote> for RemoteRecord {
    fn from(vote: Vote) -> Self {
        Self::Vote(vote)
    }
}
