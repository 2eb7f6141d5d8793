//! Post schema.

use crate::clock::Timestamp;
use crate::entity::EntityId;
use murmur_identity::{verify, CanonicalPayload, Envelope, PublicKey, Session, Signature};
use serde::{Deserialize, Serialize};

/// A top-level post.
///
/// `upvotes`, `downvotes` and `comment_count` are the only mutable fields and
/// are excluded from the signed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    /// Globally unique, client-generated id.
    pub id: EntityId,
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
    /// Comments observed by this node.
    #[serde(default)]
    pub comment_count: u64,
    /// Signature over [`canonical_payload`](Self::canonical_payload).
    pub signature: Signature,
}

impl Post {
    /// Builds and signs a new post with zeroed counters.
    #[must_use]
    pub fn signed(
        session: &Session,
        id: EntityId,
        content: Envelope,
        created_at: Timestamp,
    ) -> Self {
        let mut post = Self {
            id,
            author_public_key: session.public_key(),
            content,
            created_at,
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            signature: Signature::from_bytes([0; 64]),
        };
        post.signature = session.sign(&post.canonical_payload());
        post
    }

    /// Returns the signing input: id, author, content and creation time.
    #[must_use]
    pub fn canonical_payload(&self) -> Vec<u8> {
        CanonicalPayload::new("post")
            .text("id", self.id.to_string())
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

    /// Popularity score: upvotes minus downvotes.
    ///
    /// Widened to `i128` so any pair of counters a peer reports has an
    /// exact score.
    #[must_use]
    pub fn score(&self) -> i128 {
        i128::from(self.upvotes) - i128::from(self.downvotes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_identity::KdfParams;

    fn session() -> Session {
        Session::generate(&KdfParams::fast_for_tests()).unwrap()
    }

    fn post(session: &Session) -> Post {
        let content = session.encrypt(b"hello").unwrap();
        Post::signed(session, EntityId::new(), content, Timestamp(1_700_000_000_000))
    }

    #[test]
    fn signed_post_verifies() {
        let session = session();
        let post = post(&session);
        assert!(post.verify_signature());
        assert_eq!(post.author_public_key, session.public_key());
        assert_eq!((post.upvotes, post.downvotes, post.comment_count), (0, 0, 0));
    }

    #[test]
    fn counters_are_not_signed() {
        let mut post = post(&session());
        post.upvotes = 17;
        post.downvotes = 3;
        post.comment_count = 9;
        assert!(post.verify_signature());
        assert_eq!(post.score(), 14);
    }

    #[test]
    fn score_is_exact_at_the_extremes() {
        let mut post = post(&session());
        post.upvotes = u64::MAX;
        assert_eq!(post.score(), i128::from(u64::MAX));
        post.upvotes = 0;
        post.downvotes = u64::MAX;
        assert_eq!(post.score(), -i128::from(u64::MAX));
    }

    #[test]
    fn immutable_fields_are_signed() {
        let session = session();
        let original = post(&session);

        let mut tampered = original.clone();
        tampered.created_at = Timestamp(0);
        assert!(!tampered.verify_signature());

        let mut tampered = original.clone();
        tampered.content.ciphertext[0] ^= 1;
        assert!(!tampered.verify_signature());

        let mut tampered = original;
        tampered.author_public_key = murmur_identity::KeyPair::generate().unwrap().public_key();
        assert!(!tampered.verify_signature());
    }

    #[test]
    fn wire_field_names() {
        let post = post(&session());
        let json = serde_json::to_value(&post).unwrap();
        for field in [
            "id",
            "authorPublicKey",
            "content",
            "createdAt",
            "upvotes",
            "downvotes",
            "commentCount",
            "signature",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
    }
}
