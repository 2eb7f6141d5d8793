//! Vote schema.

use crate::clock::Timestamp;
use crate::entity::{EntityId, TargetKind, VoteValue};
use murmur_identity::{verify, CanonicalPayload, PublicKey, Session, Signature};
use serde::{Deserialize, Serialize};

/// The compound key under which at most one vote may exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoteKey {
    /// Voted entity.
    pub target_id: EntityId,
    /// Kind of the voted entity.
    pub target_kind: TargetKind,
    /// Voter identity.
    pub voter: PublicKey,
}

/// A signed `+1` / `-1` on a post or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    /// Globally unique, client-generated id.
    pub id: EntityId,
    /// Voted entity.
    pub target_id: EntityId,
    /// Kind of the voted entity.
    pub target_kind: TargetKind,
    /// Voter identity.
    pub voter_public_key: PublicKey,
    /// Polarity.
    pub value: VoteValue,
    /// Time the vote was cast or last flipped.
    pub created_at: Timestamp,
    /// Signature over [`canonical_payload`](Self::canonical_payload).
    pub signature: Signature,
}

impl Vote {
    /// Builds and signs a vote.
    #[must_use]
    pub fn signed(
        session: &Session,
        id: EntityId,
        target_id: EntityId,
        target_kind: TargetKind,
        value: VoteValue,
        created_at: Timestamp,
    ) -> Self {
        let mut vote = Self {
            id,
            target_id,
            target_kind,
            voter_public_key: session.public_key(),
            value,
            created_at,
            signature: Signature::from_bytes([0; 64]),
        };
        vote.signature = session.sign(&vote.canonical_payload());
        vote
    }

    /// Returns the uniqueness key.
    #[must_use]
    pub fn key(&self) -> VoteKey {
        VoteKey {
            target_id: self.target_id,
            target_kind: self.target_kind,
            voter: self.voter_public_key,
        }
    }

    /// Returns the signing input.
    #[must_use]
    pub fn canonical_payload(&self) -> Vec<u8> {
        CanonicalPayload::new("vote")
            .text("id", self.id.to_string())
            .text("target_id", self.target_id.to_string())
            .text("target_kind", self.target_kind.as_str())
            .text("voter", self.voter_public_key.to_hex())
            .integer("value", i64::from(self.value.as_i8()))
            .integer("created_at", self.created_at.as_millis())
            .finish()
    }

    /// Checks the signature against the embedded voter key.
    #[must_use]
    pub fn verify_signature(&self) -> bool {
        verify(
            &self.canonical_payload(),
            &self.signature,
            &self.voter_public_key,
        )
    }

    /// Whether `self` beats `other` for the same [`VoteKey`].
    ///
    /// Later `created_at` wins; equal times fall back to the larger id.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        (self.created_at, self.id) > (other.created_at, other.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_identity::KdfParams;

    fn vote(session: &Session, value: VoteValue, at: i64) -> Vote {
        Vote::signed(
            session,
            EntityId::new(),
            EntityId::new(),
            TargetKind::Post,
            value,
            Timestamp(at),
        )
    }

    #[test]
    fn value_and_target_are_signed() {
        let session = Session::generate(&KdfParams::fast_for_tests()).unwrap();
        let up = vote(&session, VoteValue::Up, 1);
        assert!(up.verify_signature());

        let mut flipped = up.clone();
        flipped.value = VoteValue::Down;
        assert!(!flipped.verify_signature());

        let mut retargeted = up;
        retargeted.target_kind = TargetKind::Comment;
        assert!(!retargeted.verify_signature());
    }

    #[test]
    fn later_vote_supersedes() {
        let session = Session::generate(&KdfParams::fast_for_tests()).unwrap();
        let early = vote(&session, VoteValue::Up, 10);
        let late = vote(&session, VoteValue::Down, 20);
        assert!(late.supersedes(&early));
        assert!(!early.supersedes(&late));
        assert!(!early.supersedes(&early));

        let mut tie = early.clone();
        tie.id = EntityId::from_bytes([0xff; 16]);
        assert!(tie.supersedes(&early));
    }

    #[test]
    fn wire_shape() {
        let session = Session::generate(&KdfParams::fast_for_tests()).unwrap();
        let json = serde_json::to_value(vote(&session, VoteValue::Down, 1)).unwrap();
        assert_eq!(json["value"], -1);
        assert_eq!(json["targetKind"], "post");
        assert!(json.get("voterPublicKey").is_some());
    }
}
