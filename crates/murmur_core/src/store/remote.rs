//! Admission of records replicated from other nodes.
//!
//! Every path runs dedupe, then signature verification, then the merge
//! inside the single-writer section. The dedupe check is repeated under
//! the write lock because two deliveries of the same record may race.

use super::local::{ensure_signed, insert_comment};
use super::ReplicaStore;
use crate::entity::{Comment, NotificationAction, Post, TableKind, Vote, VoteValue};
use crate::error::{CoreError, CoreResult};
use crate::tables::Tables;

/// What happened to an inbound record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Stored, with side effects applied.
    Admitted,
    /// Already stored; nothing changed.
    Duplicate,
    /// A newer vote by the same voter on the same target is already held.
    Stale,
}

impl ReplicaStore {
    /// Admits a remote post with the counters it arrived with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSignature` for a record that fails verification; the
    /// store is left unchanged.
    pub fn admit_post(&self, post: Post) -> CoreResult<Admission> {
        if self.tables.read().posts.get(&post.id).is_some() {
            return Ok(Admission::Duplicate);
        }
        ensure_signed(post.verify_signature())?;

        self.write(|txn| {
            if txn.tables().posts.get(&post.id).is_some() {
                return Ok(Admission::Duplicate);
            }
            txn.put(post)?;
            Ok(Admission::Admitted)
        })
    }

    /// Admits a remote comment, bumping the post's comment count and
    /// notifying the replied-to author.
    ///
    /// A comment whose post has not arrived yet is still stored.
    pub fn admit_comment(&self, comment: Comment) -> CoreResult<Admission> {
        if self.tables.read().comments.get(&comment.id).is_some() {
            return Ok(Admission::Duplicate);
        }
        ensure_signed(comment.verify_signature())?;

        self.write(|txn| {
            if txn.tables().comments.get(&comment.id).is_some() {
                return Ok(Admission::Duplicate);
            }
            insert_comment(txn, comment)?;
            Ok(Admission::Admitted)
        })
    }

    /// Admits a remote vote and re-runs the counter adjustment on its
    /// target.
    ///
    /// - a record with a known id is a duplicate unless it carries a later
    ///   `created_at`, in which case it is the voter's flip and replaces the
    ///   stored version
    /// - a copy of a vote this node retracted is a duplicate unless it is
    ///   later than the retracted version
    /// - a record for a (target, kind, voter) already held under another id
    ///   wins only if it is later ([`Vote::supersedes`]); the loser is
    ///   removed and counters move by the net change
    /// - a fresh upvote notifies the target's author
    ///
    /// A vote whose target has not arrived yet is stored without touching
    /// any counter.
    pub fn admit_vote(&self, vote: Vote) -> CoreResult<Admission> {
        if is_known_vote(&self.tables.read(), &vote) {
            return Ok(Admission::Duplicate);
        }
        ensure_signed(vote.verify_signature())?;

        self.write(|txn| {
            let (kind, target, voter) = (vote.target_kind, vote.target_id, vote.voter_public_key);
            if let Some(marker) = txn.tables().retractions.get(&vote.id) {
                if marker.covers(&vote) {
                    return Ok(Admission::Duplicate);
                }
            }

            if let Some(stored) = txn.tables().votes.get(&vote.id).cloned() {
                if vote.created_at <= stored.created_at {
                    return Ok(Admission::Duplicate);
                }
                if stored.key() != vote.key() {
                    return Err(CoreError::invalid_operation(format!(
                        "vote {} reused for a different target or voter",
                        vote.id
                    )));
                }
                txn.put(vote.clone())?;
                if stored.value != vote.value {
                    txn.adjust_votes(kind, target, stored.value, -1)?;
                    txn.adjust_votes(kind, target, vote.value, 1)?;
                }
                return Ok(Admission::Admitted);
            }

            let holder = txn.tables().votes.by_key(&vote.key()).cloned();
            if let Some(holder) = &holder {
                if !vote.supersedes(holder) {
                    return Ok(Admission::Stale);
                }
                txn.delete(TableKind::Votes, holder.id);
                txn.adjust_votes(kind, target, holder.value, -1)?;
            }

            txn.put(vote.clone())?;
            if txn.adjust_votes(kind, target, vote.value, 1)?.is_none() {
                tracing::debug!(
                    vote = %vote.id,
                    target = %target,
                    "target not stored, counters unchanged"
                );
            }

            if holder.is_none() && vote.value == VoteValue::Up {
                if let Some(author) = txn.target_author(kind, &target) {
                    txn.notify(author, voter, target, kind, NotificationAction::Upvote)?;
                }
            }
            Ok(Admission::Admitted)
        })
    }
}

fn is_known_vote(tables: &Tables, vote: &Vote) -> bool {
    if let Some(stored) = tables.votes.get(&vote.id) {
        return vote.created_at <= stored.created_at;
    }
    tables
        .retractions
        .get(&vote.id)
        .is_some_and(|marker| marker.covers(vote))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::clock::Timestamp;
    use crate::config::StoreConfig;
    use crate::entity::{EntityId, TargetKind};
    use crate::store::VoteState;
    use murmur_identity::IdentityError;

    #[test]
    fn redelivered_post_is_idempotent() {
        let (origin, _) = store();
        let (replica, _) = store();
        let alice = session();
        let post = origin.create_post(&alice, b"hi").unwrap();

        assert_eq!(replica.admit_post(post.clone()).unwrap(), Admission::Admitted);
        assert_eq!(replica.admit_post(post.clone()).unwrap(), Admission::Duplicate);
        assert_eq!(replica.counts().posts, 1);
        assert_eq!(replica.get_post(&post.id).unwrap(), post);
    }

    #[test]
    fn remote_post_keeps_stated_counters() {
        let (replica, _) = store();
        let alice = session();
        let mut post = Post::signed(
            &alice,
            EntityId::new(),
            alice.encrypt(b"hi").unwrap(),
            T0,
        );
        post.upvotes = 4;
        post.comment_count = 2;
        replica.admit_post(post.clone()).unwrap();

        let stored = replica.get_post(&post.id).unwrap();
        assert_eq!((stored.upvotes, stored.comment_count), (4, 2));
    }

    #[test]
    fn tampered_post_is_rejected() {
        let (replica, _) = store();
        let alice = session();
        let mut post = Post::signed(&alice, EntityId::new(), alice.encrypt(b"hi").unwrap(), T0);
        post.content = alice.encrypt(b"something else").unwrap();

        let err = replica.admit_post(post).unwrap_err();
        assert!(matches!(err, CoreError::Identity(IdentityError::InvalidSignature)));
        assert!(err.is_integrity_failure());
        assert_eq!(replica.counts().posts, 0);
    }

    #[test]
    fn remote_comment_counts_once() {
        let (origin, _) = store();
        let (replica, _) = store();
        let alice = session();
        let bob = session();
        let post = origin.create_post(&alice, b"hi").unwrap();
        let comment = origin.create_comment(&bob, post.id, b"yo", None).unwrap();

        replica.admit_post(post.clone()).unwrap();
        replica.admit_comment(comment.clone()).unwrap();
        replica.admit_comment(comment).unwrap();

        assert_eq!(replica.get_post(&post.id).unwrap().comment_count, 1);
        assert_eq!(replica.list_notifications(&alice.public_key()).len(), 1);
    }

    #[test]
    fn orphan_comment_is_stored() {
        let (origin, _) = store();
        let (replica, _) = store();
        let alice = session();
        let post = origin.create_post(&alice, b"hi").unwrap();
        let comment = origin.create_comment(&alice, post.id, b"yo", None).unwrap();

        assert_eq!(replica.admit_comment(comment).unwrap(), Admission::Admitted);
        assert_eq!(replica.counts().comments, 1);
        assert_eq!(replica.counts().notifications, 0);
    }

    #[test]
    fn redelivered_vote_leaves_counters() {
        let (origin, _) = store();
        let (replica, _) = store();
        let alice = session();
        let bob = session();
        let post = origin.create_post(&alice, b"hi").unwrap();
        let vote = origin
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap()
            .vote
            .unwrap();

        replica.admit_post(post.clone()).unwrap();
        assert_eq!(replica.admit_vote(vote.clone()).unwrap(), Admission::Admitted);
        assert_eq!(replica.admit_vote(vote).unwrap(), Admission::Duplicate);

        let stored = replica.get_post(&post.id).unwrap();
        assert_eq!(stored.upvotes, 1);
        assert_eq!(replica.counts().votes, 1);
        assert_eq!(replica.list_notifications(&alice.public_key()).len(), 1);
    }

    #[test]
    fn own_retraction_survives_redelivery() {
        let (store, clock) = store();
        let alice = session();
        let bob = session();
        let post = store.create_post(&alice, b"hi").unwrap();

        let published = store
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap()
            .vote
            .unwrap();
        let retracted = store
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();
        assert_eq!(retracted.state, VoteState::Retracted);

        assert_eq!(store.admit_vote(published.clone()).unwrap(), Admission::Duplicate);
        let stored = store.get_post(&post.id).unwrap();
        assert_eq!(stored.upvotes, 0);
        assert_eq!(store.counts().votes, 0);

        // The next toggle casts afresh instead of retracting a revived vote.
        clock.advance(std::time::Duration::from_secs(1));
        let again = store
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();
        assert_eq!(again.state, VoteState::Cast);
        assert_eq!(again.counters.upvotes, 1);
    }

    #[test]
    fn later_version_of_retracted_vote_is_admitted() {
        let (store, _) = store();
        let alice = session();
        let bob = session();
        let post = store.create_post(&alice, b"hi").unwrap();
        let published = store
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap()
            .vote
            .unwrap();
        store
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();

        // Flipped on another device after this node's copy was withdrawn.
        let later = Vote::signed(
            &bob,
            published.id,
            post.id,
            TargetKind::Post,
            VoteValue::Down,
            Timestamp(published.created_at.0 + 5),
        );
        assert_eq!(store.admit_vote(later).unwrap(), Admission::Admitted);
        let stored = store.get_post(&post.id).unwrap();
        assert_eq!((stored.upvotes, stored.downvotes), (0, 1));
    }

    #[test]
    fn retraction_marker_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replica.journal");
        let alice = session();
        let bob = session();

        let (post, published) = {
            let store = ReplicaStore::open_path(&path, StoreConfig::default()).unwrap();
            let post = store.create_post(&alice, b"hi").unwrap();
            let vote = store
                .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Down)
                .unwrap()
                .vote
                .unwrap();
            store
                .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Down)
                .unwrap();
            (post, vote)
        };

        let store = ReplicaStore::open_path(&path, StoreConfig::default()).unwrap();
        assert_eq!(store.admit_vote(published).unwrap(), Admission::Duplicate);
        assert_eq!(store.get_post(&post.id).unwrap().downvotes, 0);
    }

    #[test]
    fn replicated_flip_replaces_version() {
        let (origin, clock) = store();
        let (replica, _) = store();
        let alice = session();
        let bob = session();
        let post = origin.create_post(&alice, b"hi").unwrap();
        replica.admit_post(post.clone()).unwrap();

        let up = origin
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap()
            .vote
            .unwrap();
        clock.advance(std::time::Duration::from_secs(1));
        let down = origin
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Down)
            .unwrap()
            .vote
            .unwrap();

        replica.admit_vote(up.clone()).unwrap();
        replica.admit_vote(down.clone()).unwrap();
        // A late redelivery of the old version changes nothing.
        assert_eq!(replica.admit_vote(up).unwrap(), Admission::Duplicate);

        let stored = replica.get_post(&post.id).unwrap();
        assert_eq!((stored.upvotes, stored.downvotes), (0, 1));
        assert_eq!(replica.get_vote(&down.id).unwrap().value, VoteValue::Down);
    }

    #[test]
    fn competing_votes_keep_the_later_one() {
        let (replica, _) = store();
        let alice = session();
        let bob = session();
        let post = Post::signed(&alice, EntityId::new(), alice.encrypt(b"p").unwrap(), T0);
        replica.admit_post(post.clone()).unwrap();

        let early = Vote::signed(
            &bob,
            EntityId::new(),
            post.id,
            TargetKind::Post,
            VoteValue::Up,
            Timestamp(10),
        );
        let late = Vote::signed(
            &bob,
            EntityId::new(),
            post.id,
            TargetKind::Post,
            VoteValue::Down,
            Timestamp(20),
        );

        replica.admit_vote(late.clone()).unwrap();
        assert_eq!(replica.admit_vote(early.clone()).unwrap(), Admission::Stale);
        assert_eq!(replica.counts().votes, 1);

        // Reverse arrival order converges to the same state.
        let (other, _) = store();
        other.admit_post(post.clone()).unwrap();
        other.admit_vote(early).unwrap();
        other.admit_vote(late.clone()).unwrap();

        for node in [&replica, &other] {
            let stored = node.get_post(&post.id).unwrap();
            assert_eq!((stored.upvotes, stored.downvotes), (0, 1));
            assert_eq!(
                node.vote_for(post.id, TargetKind::Post, bob.public_key()).unwrap().id,
                late.id
            );
        }
    }

    #[test]
    fn vote_before_target_is_stored() {
        let (replica, _) = store();
        let bob = session();
        let vote = Vote::signed(
            &bob,
            EntityId::new(),
            EntityId::new(),
            TargetKind::Comment,
            VoteValue::Up,
            T0,
        );
        assert_eq!(replica.admit_vote(vote).unwrap(), Admission::Admitted);
        assert_eq!(replica.counts().votes, 1);
    }

    #[test]
    fn tampered_vote_is_rejected() {
        let (replica, _) = store();
        let bob = session();
        let mut vote = Vote::signed(
            &bob,
            EntityId::new(),
            EntityId::new(),
            TargetKind::Post,
            VoteValue::Up,
            T0,
        );
        vote.value = VoteValue::Down;
        assert!(replica.admit_vote(vote).is_err());
        assert_eq!(replica.counts().votes, 0);
    }
}
