//! Comment schema.

use crate::clock::Timestamp;
use crate::entity::EntityId;
use murmur_identity::{verify, CanonicalPayload, Envelope, PublicKey, Session, Signature};
use serde::{Deserialize, Serialize};

/// A comment on a post, optionally nested under another comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Globally unique, client-generated id.
    pub id: EntityId,
    /// The post this comment belongs to.
    pub post_id: EntityId,
    /// The comment this one replies to, if nested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_comment_id: Option<EntityId>,
    /// Author identity.
    pub author_public_key: PublicKey,
    /// Encrypted body.
    pub content: Envelope,
    /// Creation time.
    pub created_at: Timestamp,
    /// Upvotes observed by this node.
    #[serde(default)]
    pub upvotes: u64,
    /// Downvotes observed by this node.
    #[serde(default)]
    pub downvotes: u64,
    /// Signature over [`canonical_payload`](Self::canonical_payload).
    pub signature: Signature,
}

impl Comment {
    /// Builds and signs a new comment with zeroed counters.
    #[must_use]
    pub fn signed(
        session: &Session,
        id: EntityId,
        post_id: EntityId,
        parent_comment_id: Option<EntityId>,
        content: Envelope,
        created_at: Timestamp,
    ) -> Self {
        let mut comment = Self {
            id,
            post_id,
            parent_comment_id,
            author_public_key: session.public_key(),
            content,
            created_at,
            upvotes: 0,
            downvotes: 0,
            signature: Signature::from_bytes([0; 64]),
        };
        comment.signature = session.sign(&comment.canonical_payload());
        comment
    }

    /// Returns the signing input, including the linking fields.
    #[must_use]
    pub fn canonical_payload(&self) -> Vec<u8> {
        CanonicalPayload::new("comment")
            .text("id", self.id.to_string())
            .text("post_id", self.post_id.to_string())
            .optional_text(
                "parent_comment_id",
                self.parent_comment_id.map(|p| p.to_string()),
            )
            .text("author", self.author_public_key.to_hex())
            .field("content", self.content.canonical())
            .integer("created_at", self.created_at.as_millis())
            .finish()
    }

    /// Checks the signature against the embedded author key.
    #[must_use]
    pub fn verify_signature(&self) -> bool {
        verify(
            &self.canonical_payload(),
            &self.signature,
            &self.author_public_key,
        )
    }
}
