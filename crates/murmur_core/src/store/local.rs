//! Local writes: posts, comments and toggle votes.

use super::txn::{Counters, WriteTxn};
use super::ReplicaStore;
use crate::clock::Timestamp;
use crate::entity::{
    Comment, EntityId, NotificationAction, Post, Retraction, TableKind, TargetKind, Vote, VoteKey,
    VoteValue,
};
use crate::error::{CoreError, CoreResult};
use murmur_identity::{IdentityError, Session};
use serde::Serialize;

/// What a [`ReplicaStore::cast_vote`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
    /// No vote existed; one was recorded.
    Cast,
    /// The same vote was re-asserted and has been removed.
    Retracted,
    /// The opposite vote existed and was flipped.
    Flipped,
}

/// Result of a vote toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteOutcome {
    /// Resulting transition.
    pub state: VoteState,
    /// The vote now held for (target, kind, voter), if any. This is the
    /// record to publish.
    pub vote: Option<Vote>,
    /// Target counters after the change.
    pub counters: Counters,
}

impl ReplicaStore {
    /// Encrypts, signs and stores a new post with zeroed counters.
    ///
    /// # Errors
    ///
    /// Returns `KeyNotInitialized` if the session has no master key, or a
    /// storage error if the journal write fails.
    pub fn create_post(&self, session: &Session, content: &[u8]) -> CoreResult<Post> {
        let envelope = session.encrypt(content)?;
        let post = Post::signed(session, EntityId::new(), envelope, self.now());
        ensure_signed(post.verify_signature())?;

        self.write(|txn| txn.put(post.clone()))?;
        tracing::debug!(id = %post.id, author = %post.author_public_key, "post created");
        Ok(post)
    }

    /// Encrypts, signs and stores a comment, bumping the post's comment
    /// count and notifying the replied-to author.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the post or parent comment is not stored, and
    /// `InvalidOperation` if the parent comment belongs to another post.
    pub fn create_comment(
        &self,
        session: &Session,
        post_id: EntityId,
        content: &[u8],
        parent_comment_id: Option<EntityId>,
    ) -> CoreResult<Comment> {
        let envelope = session.encrypt(content)?;
        let comment = Comment::signed(
            session,
            EntityId::new(),
            post_id,
            parent_comment_id,
            envelope,
            self.now(),
        );
        ensure_signed(comment.verify_signature())?;

        self.write(|txn| {
            if txn.tables().posts.get(&post_id).is_none() {
                return Err(CoreError::not_found(TableKind::Posts, post_id));
            }
            if let Some(parent_id) = parent_comment_id {
                let parent = txn
                    .tables()
                    .comments
                    .get(&parent_id)
                    .ok_or_else(|| CoreError::not_found(TableKind::Comments, parent_id))?;
                if parent.post_id != post_id {
                    return Err(CoreError::invalid_operation(format!(
                        "comment {parent_id} belongs to post {}, not {post_id}",
                        parent.post_id
                    )));
                }
            }
            insert_comment(txn, comment.clone())
        })?;

        tracing::debug!(id = %comment.id, post = %post_id, "comment created");
        Ok(comment)
    }

    /// Casts, retracts or flips the session owner's vote on a target.
    ///
    /// - no vote yet: records it and bumps the matching counter
    /// - same value again: deletes it, undoes the counter and remembers the
    ///   id so replicated copies of the withdrawn vote are refused
    /// - opposite value: re-signs it with the new value and moves one count
    ///   across
    ///
    /// A freshly cast upvote notifies the target's author unless the voter
    /// is the author.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the target is not stored.
    pub fn cast_vote(
        &self,
        session: &Session,
        target_id: EntityId,
        target_kind: TargetKind,
        value: VoteValue,
    ) -> CoreResult<VoteOutcome> {
        let voter = session.public_key();
        let key = VoteKey {
            target_id,
            target_kind,
            voter,
        };

        let outcome = self.write(|txn| {
            let author = txn
                .target_author(target_kind, &target_id)
                .ok_or_else(|| CoreError::not_found(target_kind.table(), target_id))?;
            let existing = txn.tables().votes.by_key(&key).cloned();

            match existing {
                None => {
                    let vote = Vote::signed(
                        session,
                        EntityId::new(),
                        target_id,
                        target_kind,
                        value,
                        txn.now(),
                    );
                    txn.put(vote.clone())?;
                    let counters = adjust(txn, &vote, value, 1)?;
                    if value == VoteValue::Up {
                        txn.notify(
                            author,
                            voter,
                            target_id,
                            target_kind,
                            NotificationAction::Upvote,
                        )?;
                    }
                    Ok(VoteOutcome {
                        state: VoteState::Cast,
                        vote: Some(vote),
                        counters,
                    })
                }
                Some(old) if old.value == value => {
                    txn.delete(TableKind::Votes, old.id);
                    txn.put(Retraction::of(&old))?;
                    let counters = adjust(txn, &old, value, -1)?;
                    Ok(VoteOutcome {
                        state: VoteState::Retracted,
                        vote: None,
                        counters,
                    })
                }
                Some(old) => {
                    // Keep the id; a strictly later timestamp makes the new
                    // version win wherever the old one was replicated.
                    let at = txn.now().max(Timestamp(old.created_at.0.saturating_add(1)));
                    let vote = Vote::signed(session, old.id, target_id, target_kind, value, at);
                    txn.put(vote.clone())?;
                    adjust(txn, &vote, old.value, -1)?;
                    let counters = adjust(txn, &vote, value, 1)?;
                    Ok(VoteOutcome {
                        state: VoteState::Flipped,
                        vote: Some(vote),
                        counters,
                    })
                }
            }
        })?;

        tracing::debug!(
            target = %target_id,
            kind = %target_kind,
            state = ?outcome.state,
            upvotes = outcome.counters.upvotes,
            downvotes = outcome.counters.downvotes,
            "vote applied"
        );
        Ok(outcome)
    }
}

fn adjust(
    txn: &mut WriteTxn<'_>,
    vote: &Vote,
    value: VoteValue,
    delta: i64,
) -> CoreResult<Counters> {
    Ok(txn
        .adjust_votes(vote.target_kind, vote.target_id, value, delta)?
        .unwrap_or_default())
}

pub(super) fn ensure_signed(valid: bool) -> CoreResult<()> {
    if valid {
        Ok(())
    } else {
        Err(IdentityError::InvalidSignature.into())
    }
}

/// Stores a comment and runs its side effects: the post's comment count
/// and a reply notification for the replied-to author.
pub(super) fn insert_comment(txn: &mut WriteTxn<'_>, comment: Comment) -> CoreResult<()> {
    let commenter = comment.author_public_key;
    let (id, post_id, parent) = (comment.id, comment.post_id, comment.parent_comment_id);
    txn.put(comment)?;

    if !txn.adjust_comment_count(post_id, 1)? {
        tracing::debug!(
            comment = %id,
            post = %post_id,
            "post not stored, comment count unchanged"
        );
    }

    let (target_kind, target_id) = match parent {
        Some(parent_id) => (TargetKind::Comment, parent_id),
        None => (TargetKind::Post, post_id),
    };
    match txn.target_author(target_kind, &target_id) {
        Some(recipient) => {
            txn.notify(
                recipient,
                commenter,
                target_id,
                target_kind,
                NotificationAction::Reply,
            )?;
        }
        None => {
            tracing::debug!(
                comment = %id,
                target = %target_id,
                "reply target not stored, no notification"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn new_post_has_zero_counters() {
        let (store, _) = store();
        let alice = session();
        let post = store.create_post(&alice, b"hi").unwrap();

        assert_eq!(store.counts().posts, 1);
        let stored = store.get_post(&post.id).unwrap();
        assert_eq!(stored, post);
        assert_eq!((stored.upvotes, stored.downvotes, stored.comment_count), (0, 0, 0));
        assert!(stored.verify_signature());
        assert_eq!(stored.created_at, T0);
    }

    #[test]
    fn create_post_needs_master_key() {
        let (store, _) = store();
        let session = Session::new(murmur_identity::KeyPair::generate().unwrap());
        let err = store.create_post(&session, b"hi").unwrap_err();
        assert!(matches!(
            err,
            CoreError::Identity(IdentityError::KeyNotInitialized)
        ));
        assert_eq!(store.counts().posts, 0);
    }

    #[test]
    fn vote_toggle_cancels() {
        let (store, _) = store();
        let alice = session();
        let voter = session();
        let post = store.create_post(&alice, b"hi").unwrap();

        let first = store
            .cast_vote(&voter, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();
        assert_eq!(first.state, VoteState::Cast);
        assert_eq!(first.counters.upvotes, 1);

        let second = store
            .cast_vote(&voter, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();
        assert_eq!(second.state, VoteState::Retracted);
        assert!(second.vote.is_none());
        assert_eq!(store.get_post(&post.id).unwrap().upvotes, 0);
        assert!(store
            .vote_for(post.id, TargetKind::Post, voter.public_key())
            .is_none());
        assert_eq!(store.counts().votes, 0);
    }

    #[test]
    fn vote_flip_moves_one_count() {
        let (store, _) = store();
        let alice = session();
        let voter = session();
        let post = store.create_post(&alice, b"hi").unwrap();

        let up = store
            .cast_vote(&voter, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();
        let down = store
            .cast_vote(&voter, post.id, TargetKind::Post, VoteValue::Down)
            .unwrap();

        assert_eq!(down.state, VoteState::Flipped);
        assert_eq!(down.counters, Counters { upvotes: 0, downvotes: 1 });
        let flipped = down.vote.unwrap();
        let original = up.vote.unwrap();
        assert_eq!(flipped.id, original.id);
        assert!(flipped.created_at > original.created_at);
        assert!(flipped.verify_signature());
        assert_eq!(store.counts().votes, 1);
        assert_eq!(
            store
                .vote_for(post.id, TargetKind::Post, voter.public_key())
                .unwrap()
                .value,
            VoteValue::Down
        );
    }

    #[test]
    fn upvote_notifies_author_but_not_self() {
        let (store, _) = store();
        let alice = session();
        let bob = session();
        let post = store.create_post(&alice, b"hi").unwrap();

        store
            .cast_vote(&alice, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();
        assert_eq!(store.counts().notifications, 0);

        store
            .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Down)
            .unwrap();
        assert_eq!(store.counts().notifications, 0);

        let carol = session();
        store
            .cast_vote(&carol, post.id, TargetKind::Post, VoteValue::Up)
            .unwrap();
        let inbox = store.list_notifications(&alice.public_key());
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].action, NotificationAction::Upvote);
        assert_eq!(inbox[0].source_public_key, carol.public_key());
        assert_eq!(inbox[0].target_id, post.id);
    }

    #[test]
    fn vote_on_missing_target_fails() {
        let (store, _) = store();
        let err = store
            .cast_vote(&session(), EntityId::new(), TargetKind::Comment, VoteValue::Up)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NotFound {
                table: TableKind::Comments,
                ..
            }
        ));
        assert_eq!(store.counts().votes, 0);
    }

    #[test]
    fn comment_counts_and_notifies_parent_author() {
        let (store, _) = store();
        let alice = session();
        let bob = session();
        let carol = session();
        let post = store.create_post(&alice, b"hi").unwrap();

        let top = store.create_comment(&bob, post.id, b"first", None).unwrap();
        let reply = store
            .create_comment(&carol, post.id, b"reply", Some(top.id))
            .unwrap();
        store
            .create_comment(&alice, post.id, b"own thread", None)
            .unwrap();

        assert_eq!(store.get_post(&post.id).unwrap().comment_count, 3);
        assert_eq!(store.list_comments(&post.id).len(), 3);
        assert_eq!(store.list_replies(&top.id)[0].id, reply.id);

        let to_alice = store.list_notifications(&alice.public_key());
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].source_public_key, bob.public_key());
        assert_eq!(to_alice[0].action, NotificationAction::Reply);

        let to_bob = store.list_notifications(&bob.public_key());
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob[0].target_id, top.id);
        assert_eq!(to_bob[0].target_kind, TargetKind::Comment);
    }

    #[test]
    fn comment_validation() {
        let (store, _) = store();
        let alice = session();
        let a = store.create_post(&alice, b"a").unwrap();
        let b = store.create_post(&alice, b"b").unwrap();
        let on_a = store.create_comment(&alice, a.id, b"x", None).unwrap();

        assert!(matches!(
            store.create_comment(&alice, EntityId::new(), b"x", None),
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.create_comment(&alice, b.id, b"x", Some(on_a.id)),
            Err(CoreError::InvalidOperation { .. })
        ));
        assert_eq!(store.get_post(&b.id).unwrap().comment_count, 0);
    }

    #[test]
    fn comment_votes_use_comment_counters() {
        let (store, _) = store();
        let alice = session();
        let post = store.create_post(&alice, b"p").unwrap();
        let comment = store.create_comment(&alice, post.id, b"c", None).unwrap();

        store
            .cast_vote(&session(), comment.id, TargetKind::Comment, VoteValue::Down)
            .unwrap();
        let stored = store.get_comment(&comment.id).unwrap();
        assert_eq!((stored.upvotes, stored.downvotes), (0, 1));
        assert_eq!(store.get_post(&post.id).unwrap().downvotes, 0);
    }

    #[test]
    fn popular_orders_by_score() {
        let (store, clock) = store();
        let alice = session();
        let quiet = store.create_post(&alice, b"quiet").unwrap();
        clock.advance(std::time::Duration::from_millis(1));
        let loved = store.create_post(&alice, b"loved").unwrap();
        clock.advance(std::time::Duration::from_millis(1));
        let hated = store.create_post(&alice, b"hated").unwrap();

        for _ in 0..2 {
            store
                .cast_vote(&session(), loved.id, TargetKind::Post, VoteValue::Up)
                .unwrap();
        }
        store
            .cast_vote(&session(), hated.id, TargetKind::Post, VoteValue::Down)
            .unwrap();

        let popular: Vec<EntityId> = store.list_popular(10).iter().map(|p| p.id).collect();
        assert_eq!(popular, vec![loved.id, quiet.id, hated.id]);

        let latest: Vec<EntityId> = store.list_latest(2).iter().map(|p| p.id).collect();
        assert_eq!(latest, vec![hated.id, loved.id]);
    }
}
