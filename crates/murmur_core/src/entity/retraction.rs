//! Retraction marker schema.

use crate::clock::Timestamp;
use crate::entity::{EntityId, Vote};
use murmur_identity::PublicKey;
use serde::{Deserialize, Serialize};

/// Remembers a vote this node retracted.
///
/// Keyed by the retracted vote's id. Copies of that vote still circulating
/// on the overlay are refused unless they carry a later `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Retraction {
    /// Id of the retracted vote.
    pub vote_id: EntityId,
    /// Who retracted it.
    pub voter_public_key: PublicKey,
    /// `created_at` of the last version that was held.
    pub created_at: Timestamp,
}

impl Retraction {
    /// Marks `vote` as retracted.
    #[must_use]
    pub fn of(vote: &Vote) -> Self {
        Self {
            vote_id: vote.id,
            voter_public_key: vote.voter_public_key,
            created_at: vote.created_at,
        }
    }

    /// Returns true if `vote` is a copy of the retracted version or an
    /// older one.
    #[must_use]
    pub fn covers(&self, vote: &Vote) -> bool {
        vote.id == self.vote_id && vote.created_at <= self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{TargetKind, VoteValue};
    use murmur_identity::{KdfParams, Session};

    #[test]
    fn covers_same_and_older_versions_only() {
        let session = Session::generate(&KdfParams::fast_for_tests()).unwrap();
        let vote = Vote::signed(
            &session,
            EntityId::new(),
            EntityId::new(),
            TargetKind::Post,
            VoteValue::Up,
            Timestamp(10),
        );
        let marker = Retraction::of(&vote);
        assert!(marker.covers(&vote));

        let mut older = vote.clone();
        older.created_at = Timestamp(5);
        assert!(marker.covers(&older));

        let mut later = vote.clone();
        later.created_at = Timestamp(11);
        assert!(!marker.covers(&later));

        let mut other = vote;
        other.id = EntityId::new();
        assert!(!marker.covers(&other));
    }
}
