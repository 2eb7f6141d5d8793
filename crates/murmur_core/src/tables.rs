//! In-memory tables and their secondary indexes.
//!
//! Tables are rebuilt from the journal at open and mutated only through a
//! write transaction. Every `put` replaces the whole row and reindexes it,
//! so counter changes keep the popularity index current.

use crate::clock::Timestamp;
use crate::entity::{
    Comment, EntityId, Notification, Post, Retraction, TableKind, Vote, VoteKey,
};
use crate::error::CoreResult;
use crate::index::{MultiIndex, UniqueIndex};
use murmur_identity::PublicKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored row of any table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Row {
    /// A post row.
    Post(Post),
    /// A comment row.
    Comment(Comment),
    /// A vote row.
    Vote(Vote),
    /// A notification row.
    Notification(Notification),
    /// A retraction marker.
    Retraction(Retraction),
}

impl Row {
    /// The table this row belongs to.
    #[must_use]
    pub fn table(&self) -> TableKind {
        match self {
            Self::Post(_) => TableKind::Posts,
            Self::Comment(_) => TableKind::Comments,
            Self::Vote(_) => TableKind::Votes,
            Self::Notification(_) => TableKind::Notifications,
            Self::Retraction(_) => TableKind::Retractions,
        }
    }

    /// The row's primary key.
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::Post(p) => p.id,
            Self::Comment(c) => c.id,
            Self::Vote(v) => v.id,
            Self::Notification(n) => n.id,
            Self::Retraction(r) => r.vote_id,
        }
    }
}

impl From<Post> for Row {
    fn from(post: Post) -> Self {
        Self::Post(post)
    }
}

impl From<Comment> for Row {
    fn from(comment: Comment) -> Self {
        Self::Comment(comment)
    }
}

impl From<Vote> for Row {
    fn from(vote: Vote) -> Self {
        Self::Vote(vote)
    }
}

impl From<Notification> for Row {
    fn from(notification: Notification) -> Self {
        Self::Notification(notification)
    }
}

impl From<Retraction> for Row {
    fn from(retraction: Retraction) -> Self {
        Self::Retraction(retraction)
    }
}

/// Posts with indexes by time, popularity and author.
#[derive(Debug, Default)]
pub struct PostTable {
    rows: BTreeMap<EntityId, Post>,
    by_created: MultiIndex<Timestamp>,
    by_score: MultiIndex<i128>,
    by_author: MultiIndex<PublicKey>,
}

impl PostTable {
    /// Looks up a post.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Post> {
        self.rows.get(id)
    }

    /// Number of posts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Iterates all posts in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.rows.values()
    }

    /// Newest first.
    pub fn latest(&self) -> impl Iterator<Item = &Post> {
        self.by_created
            .iter()
            .rev()
            .filter_map(|(_, id)| self.rows.get(&id))
    }

    /// Highest score first; equal scores newest first.
    #[must_use]
    pub fn popular(&self, limit: usize) -> Vec<&Post> {
        let mut out: Vec<&Post> = Vec::with_capacity(limit.min(self.rows.len()));
        let mut bucket: Vec<&Post> = Vec::new();
        let mut current: Option<i128> = None;
        for (score, id) in self.by_score.iter().rev() {
            if current != Some(*score) {
                flush_bucket(&mut out, &mut bucket);
                if out.len() >= limit {
                    break;
                }
                current = Some(*score);
            }
            if let Some(post) = self.rows.get(&id) {
                bucket.push(post);
            }
        }
        flush_bucket(&mut out, &mut bucket);
        out.truncate(limit);
        out
    }

    /// Posts by one author, newest first.
    #[must_use]
    pub fn by_author(&self, author: &PublicKey) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .by_author
            .get(author)
            .filter_map(|id| self.rows.get(&id))
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        posts
    }

    fn insert(&mut self, post: Post) -> Option<Post> {
        let previous = self.remove(&post.id);
        self.by_created.insert(post.created_at, post.id);
        self.by_score.insert(post.score(), post.id);
        self.by_author.insert(post.author_public_key, post.id);
        self.rows.insert(post.id, post);
        previous
    }

    fn remove(&mut self, id: &EntityId) -> Option<Post> {
        let post = self.rows.remove(id)?;
        self.by_created.remove(&post.created_at, post.id);
        self.by_score.remove(&post.score(), post.id);
        self.by_author.remove(&post.author_public_key, post.id);
        Some(post)
    }
}

fn flush_bucket<'a>(out: &mut Vec<&'a Post>, bucket: &mut Vec<&'a Post>) {
    bucket.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
    out.append(bucket);
}

/// Comments with indexes by post, parent comment and author.
#[derive(Debug, Default)]
pub struct CommentTable {
    rows: BTreeMap<EntityId, Comment>,
    by_post: MultiIndex<EntityId>,
    by_parent: MultiIndex<EntityId>,
    by_author: MultiIndex<PublicKey>,
}

impl CommentTable {
    /// Looks up a comment.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Comment> {
        self.rows.get(id)
    }

    /// Number of comments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Iterates all comments in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.rows.values()
    }

    /// All comments on a post, oldest first.
    #[must_use]
    pub fn by_post(&self, post_id: &EntityId) -> Vec<&Comment> {
        self.collect_oldest_first(self.by_post.get(post_id))
    }

    /// Direct replies to a comment, oldest first.
    #[must_use]
    pub fn by_parent(&self, parent_id: &EntityId) -> Vec<&Comment> {
        self.collect_oldest_first(self.by_parent.get(parent_id))
    }

    /// Comment ids by one author.
    pub fn ids_by_author(&self, author: &PublicKey) -> Vec<EntityId> {
        self.by_author.get(author).collect()
    }

    fn collect_oldest_first(&self, ids: impl Iterator<Item = EntityId>) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = ids.filter_map(|id| self.rows.get(&id)).collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        comments
    }

    fn insert(&mut self, comment: Comment) -> Option<Comment> {
        let previous = self.remove(&comment.id);
        self.by_post.insert(comment.post_id, comment.id);
        if let Some(parent) = comment.parent_comment_id {
            self.by_parent.insert(parent, comment.id);
        }
        self.by_author.insert(comment.author_public_key, comment.id);
        self.rows.insert(comment.id, comment);
        previous
    }

    fn remove(&mut self, id: &EntityId) -> Option<Comment> {
        let comment = self.rows.remove(id)?;
        self.by_post.remove(&comment.post_id, comment.id);
        if let Some(parent) = comment.parent_comment_id {
            self.by_parent.remove(&parent, comment.id);
        }
        self.by_author.remove(&comment.author_public_key, comment.id);
        Some(comment)
    }
}

/// Votes with an author index and the unique (target, kind, voter) key.
#[derive(Debug, Default)]
pub struct VoteTable {
    rows: BTreeMap<EntityId, Vote>,
    by_author: MultiIndex<PublicKey>,
    by_target: MultiIndex<EntityId>,
    by_key: UniqueIndex<VoteKey>,
}

impl VoteTable {
    /// Looks up a vote by id.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Vote> {
        self.rows.get(id)
    }

    /// Looks up the single vote held under `key`.
    #[must_use]
    pub fn by_key(&self, key: &VoteKey) -> Option<&Vote> {
        self.by_key.get(key).and_then(|id| self.rows.get(&id))
    }

    /// Number of votes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Iterates all votes in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Vote> {
        self.rows.values()
    }

    /// Vote ids cast by one voter.
    pub fn ids_by_author(&self, voter: &PublicKey) -> Vec<EntityId> {
        self.by_author.get(voter).collect()
    }

    /// Vote ids on one target.
    pub fn ids_by_target(&self, target_id: &EntityId) -> Vec<EntityId> {
        self.by_target.get(target_id).collect()
    }

    fn insert(&mut self, vote: Vote) -> CoreResult<Option<Vote>> {
        self.by_key.check(&vote.key(), vote.id)?;
        let previous = self.remove(&vote.id);
        self.by_author.insert(vote.voter_public_key, vote.id);
        self.by_target.insert(vote.target_id, vote.id);
        self.by_key.insert(vote.key(), vote.id)?;
        self.rows.insert(vote.id, vote);
        Ok(previous)
    }

    fn remove(&mut self, id: &EntityId) -> Option<Vote> {
        let vote = self.rows.remove(id)?;
        self.by_author.remove(&vote.voter_public_key, vote.id);
        self.by_target.remove(&vote.target_id, vote.id);
        self.by_key.remove(&vote.key(), vote.id);
        Some(vote)
    }
}

/// Notifications with indexes by recipient, read status and expiry.
#[derive(Debug, Default)]
pub struct NotificationTable {
    rows: BTreeMap<EntityId, Notification>,
    by_recipient: MultiIndex<PublicKey>,
    unread: MultiIndex<PublicKey>,
    by_expiry: MultiIndex<Timestamp>,
}

impl NotificationTable {
    /// Looks up a notification.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Notification> {
        self.rows.get(id)
    }

    /// Number of notifications, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Iterates all notifications in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.rows.values()
    }

    /// All notifications for a recipient, in id order.
    pub fn for_recipient(&self, recipient: &PublicKey) -> impl Iterator<Item = &Notification> {
        self.by_recipient
            .get(recipient)
            .filter_map(|id| self.rows.get(&id))
    }

    /// Unread notifications for a recipient.
    pub fn unread_for(&self, recipient: &PublicKey) -> impl Iterator<Item = &Notification> {
        self.unread.get(recipient).filter_map(|id| self.rows.get(&id))
    }

    /// Ids with `expires_at <= now`.
    #[must_use]
    pub fn expired_at(&self, now: Timestamp) -> Vec<EntityId> {
        self.by_expiry.range(..=now)
    }

    fn insert(&mut self, notification: Notification) -> Option<Notification> {
        let previous = self.remove(&notification.id);
        self.by_recipient
            .insert(notification.recipient_public_key, notification.id);
        if !notification.is_read {
            self.unread
                .insert(notification.recipient_public_key, notification.id);
        }
        self.by_expiry
            .insert(notification.expires_at, notification.id);
        self.rows.insert(notification.id, notification);
        previous
    }

    fn remove(&mut self, id: &EntityId) -> Option<Notification> {
        let n = self.rows.remove(id)?;
        self.by_recipient.remove(&n.recipient_public_key, n.id);
        self.unread.remove(&n.recipient_public_key, n.id);
        self.by_expiry.remove(&n.expires_at, n.id);
        Some(n)
    }
}

/// Retraction markers keyed by vote id, with a voter index for purge.
#[derive(Debug, Default)]
pub struct RetractionTable {
    rows: BTreeMap<EntityId, Retraction>,
    by_voter: MultiIndex<PublicKey>,
}

impl RetractionTable {
    /// Looks up the marker for a vote id.
    #[must_use]
    pub fn get(&self, vote_id: &EntityId) -> Option<&Retraction> {
        self.rows.get(vote_id)
    }

    /// Number of markers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Iterates all markers in vote id order.
    pub fn iter(&self) -> impl Iterator<Item = &Retraction> {
        self.rows.values()
    }

    /// Vote ids retracted by one voter.
    pub fn ids_by_voter(&self, voter: &PublicKey) -> Vec<EntityId> {
        self.by_voter.get(voter).collect()
    }

    fn insert(&mut self, retraction: Retraction) -> Option<Retraction> {
        let previous = self.remove(&retraction.vote_id);
        self.by_voter
            .insert(retraction.voter_public_key, retraction.vote_id);
        self.rows.insert(retraction.vote_id, retraction);
        previous
    }

    fn remove(&mut self, vote_id: &EntityId) -> Option<Retraction> {
        let r = self.rows.remove(vote_id)?;
        self.by_voter.remove(&r.voter_public_key, r.vote_id);
        Some(r)
    }
}

/// The tables of a replica.
#[derive(Debug, Default)]
pub struct Tables {
    /// Posts.
    pub posts: PostTable,
    /// Comments.
    pub comments: CommentTable,
    /// Votes.
    pub votes: VoteTable,
    /// Notifications.
    pub notifications: NotificationTable,
    /// Votes this node retracted.
    pub retractions: RetractionTable,
}

impl Tables {
    /// Inserts or replaces a row, returning the previous version.
    ///
    /// # Errors
    ///
    /// Returns an error, leaving the tables untouched, if a vote would
    /// violate the one-vote-per-key constraint.
    pub fn put(&mut self, row: Row) -> CoreResult<Option<Row>> {
        Ok(match row {
            Row::Post(post) => self.posts.insert(post).map(Row::Post),
            Row::Comment(comment) => self.comments.insert(comment).map(Row::Comment),
            Row::Vote(vote) => self.votes.insert(vote)?.map(Row::Vote),
            Row::Notification(n) => self.notifications.insert(n).map(Row::Notification),
            Row::Retraction(r) => self.retractions.insert(r).map(Row::Retraction),
        })
    }

    /// Deletes a row, returning it if it existed.
    pub fn delete(&mut self, table: TableKind, id: &EntityId) -> Option<Row> {
        match table {
            TableKind::Posts => self.posts.remove(id).map(Row::Post),
            TableKind::Comments => self.comments.remove(id).map(Row::Comment),
            TableKind::Votes => self.votes.remove(id).map(Row::Vote),
            TableKind::Notifications => self.notifications.remove(id).map(Row::Notification),
            TableKind::Retractions => self.retractions.remove(id).map(Row::Retraction),
        }
    }

    /// Returns true if a row with `id` exists in `table`.
    #[must_use]
    pub fn contains(&self, table: TableKind, id: &EntityId) -> bool {
        match table {
            TableKind::Posts => self.posts.get(id).is_some(),
            TableKind::Comments => self.comments.get(id).is_some(),
            TableKind::Votes => self.votes.get(id).is_some(),
            TableKind::Notifications => self.notifications.get(id).is_some(),
            TableKind::Retractions => self.retractions.get(id).is_some(),
        }
    }

    /// Every live row, table by table. Replaying these rebuilds the tables.
    pub fn rows(&self) -> impl Iterator<Item = Row> + '_ {
        let posts = self.posts.iter().cloned().map(Row::Post);
        let comments = self.comments.iter().cloned().map(Row::Comment);
        let votes = self.votes.iter().cloned().map(Row::Vote);
        let notifications = self.notifications.iter().cloned().map(Row::Notification);
        let retractions = self.retractions.iter().cloned().map(Row::Retraction);
        posts
            .chain(comments)
            .chain(votes)
            .chain(notifications)
            .chain(retractions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{NotificationAction, TargetKind, VoteValue};
    use murmur_identity::{KdfParams, Session};

    fn session() -> Session {
        Session::generate(&KdfParams::fast_for_tests()).unwrap()
    }

    fn post(session: &Session, at: i64) -> Post {
        Post::signed(
            session,
            EntityId::new(),
            session.encrypt(b"p").unwrap(),
            Timestamp(at),
        )
    }

    #[test]
    fn latest_is_newest_first() {
        let s = session();
        let mut tables = Tables::default();
        for at in [30, 10, 20] {
            tables.put(post(&s, at).into()).unwrap();
        }
        let times: Vec<i64> = tables.posts.latest().map(|p| p.created_at.0).collect();
        assert_eq!(times, vec![30, 20, 10]);
    }

    #[test]
    fn popularity_reindexes_on_counter_change() {
        let s = session();
        let mut tables = Tables::default();
        let a = post(&s, 1);
        let mut b = post(&s, 2);
        tables.put(a.clone().into()).unwrap();
        tables.put(b.clone().into()).unwrap();
        assert_eq!(tables.posts.popular(1)[0].id, b.id);

        b.downvotes = 2;
        tables.put(b.clone().into()).unwrap();
        let order: Vec<EntityId> = tables.posts.popular(10).iter().map(|p| p.id).collect();
        assert_eq!(order, vec![a.id, b.id]);
    }

    #[test]
    fn popularity_handles_extreme_counters() {
        let s = session();
        let mut tables = Tables::default();
        let plain = post(&s, 1);
        let mut loved = post(&s, 2);
        loved.upvotes = u64::MAX;
        let mut hated = post(&s, 3);
        hated.upvotes = i64::MAX as u64;
        hated.downvotes = u64::MAX;

        for p in [&plain, &loved, &hated] {
            tables.put(p.clone().into()).unwrap();
        }
        let order: Vec<EntityId> = tables.posts.popular(10).iter().map(|p| p.id).collect();
        assert_eq!(order, vec![loved.id, plain.id, hated.id]);

        tables.delete(TableKind::Posts, &hated.id);
        assert_eq!(tables.posts.popular(10).len(), 2);
        assert_eq!(tables.posts.latest().count(), 2);
    }

    #[test]
    fn rows_rebuild_the_tables() {
        let s = session();
        let mut tables = Tables::default();
        let p = post(&s, 1);
        tables.put(p.clone().into()).unwrap();
        let vote = Vote::signed(
            &s,
            EntityId::new(),
            p.id,
            TargetKind::Post,
            VoteValue::Up,
            Timestamp(2),
        );
        tables.put(Retraction::of(&vote).into()).unwrap();

        let mut rebuilt = Tables::default();
        for row in tables.rows() {
            rebuilt.put(row).unwrap();
        }
        assert_eq!(rebuilt.posts.get(&p.id), Some(&p));
        assert!(rebuilt.retractions.get(&vote.id).unwrap().covers(&vote));
        assert_eq!(rebuilt.retractions.ids_by_voter(&s.public_key()), vec![vote.id]);
    }

    #[test]
    fn vote_key_is_unique() {
        let s = session();
        let mut tables = Tables::default();
        let target = EntityId::new();
        let first = Vote::signed(
            &s,
            EntityId::new(),
            target,
            TargetKind::Post,
            VoteValue::Up,
            Timestamp(1),
        );
        let second = Vote::signed(
            &s,
            EntityId::new(),
            target,
            TargetKind::Post,
            VoteValue::Down,
            Timestamp(2),
        );

        tables.put(first.clone().into()).unwrap();
        assert!(tables.put(second.clone().into()).is_err());
        assert_eq!(tables.votes.len(), 1);

        tables.delete(TableKind::Votes, &first.id);
        tables.put(second.clone().into()).unwrap();
        assert_eq!(tables.votes.by_key(&second.key()).unwrap().id, second.id);
    }

    #[test]
    fn comment_indexes() {
        let s = session();
        let mut tables = Tables::default();
        let post_id = EntityId::new();
        let top = Comment::signed(
            &s,
            EntityId::new(),
            post_id,
            None,
            s.encrypt(b"a").unwrap(),
            Timestamp(2),
        );
        let reply = Comment::signed(
            &s,
            EntityId::new(),
            post_id,
            Some(top.id),
            s.encrypt(b"b").unwrap(),
            Timestamp(1),
        );
        tables.put(top.clone().into()).unwrap();
        tables.put(reply.clone().into()).unwrap();

        let on_post: Vec<EntityId> = tables
            .comments
            .by_post(&post_id)
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(on_post, vec![reply.id, top.id]);
        assert_eq!(tables.comments.by_parent(&top.id).len(), 1);
        assert_eq!(tables.comments.ids_by_author(&s.public_key()).len(), 2);

        tables.delete(TableKind::Comments, &reply.id);
        assert!(tables.comments.by_parent(&top.id).is_empty());
    }

    #[test]
    fn notification_read_and_expiry_indexes() {
        let key = PublicKey::from_bytes([7; 32]);
        let mut tables = Tables::default();
        let mut n = Notification {
            id: EntityId::new(),
            recipient_public_key: key,
            source_public_key: PublicKey::from_bytes([8; 32]),
            target_id: EntityId::new(),
            target_kind: TargetKind::Post,
            action: NotificationAction::Upvote,
            is_read: false,
            created_at: Timestamp(0),
            expires_at: Timestamp(100),
        };
        tables.put(n.clone().into()).unwrap();
        assert_eq!(tables.notifications.unread_for(&key).count(), 1);

        n.is_read = true;
        tables.put(n.clone().into()).unwrap();
        assert_eq!(tables.notifications.unread_for(&key).count(), 0);
        assert_eq!(tables.notifications.for_recipient(&key).count(), 1);

        assert!(tables.notifications.expired_at(Timestamp(99)).is_empty());
        assert_eq!(tables.notifications.expired_at(Timestamp(100)), vec![n.id]);
    }
}
