//! Single-writer transaction over the tables.

use crate::clock::Timestamp;
use crate::entity::{EntityId, Notification, NotificationAction, TableKind, TargetKind, VoteValue};
use crate::error::CoreResult;
use crate::journal::JournalRecord;
use crate::tables::{Row, Tables};
use murmur_identity::PublicKey;
use std::time::Duration;

/// Vote counters of a post or comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Upvotes.
    pub upvotes: u64,
    /// Downvotes.
    pub downvotes: u64,
}

struct Undo {
    table: TableKind,
    id: EntityId,
    previous: Option<Row>,
}

/// A write in progress.
///
/// Changes apply to the tables immediately so later reads in the same
/// transaction see them; they are journaled as one batch on commit and
/// undone in reverse order on failure.
pub struct WriteTxn<'a> {
    tables: &'a mut Tables,
    records: Vec<JournalRecord>,
    undo: Vec<Undo>,
    now: Timestamp,
    notification_ttl: Duration,
}

impl<'a> WriteTxn<'a> {
    pub(crate) fn new(tables: &'a mut Tables, now: Timestamp, notification_ttl: Duration) -> Self {
        Self {
            tables,
            records: Vec::new(),
            undo: Vec::new(),
            now,
            notification_ttl,
        }
    }

    /// Read access to the tables, including this transaction's changes.
    #[must_use]
    pub fn tables(&self) -> &Tables {
        &*self.tables
    }

    /// The time this transaction started.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Inserts or replaces a row.
    pub fn put(&mut self, row: impl Into<Row>) -> CoreResult<()> {
        let row = row.into();
        let (table, id) = (row.table(), row.id());
        let previous = self.tables.put(row.clone())?;
        self.undo.push(Undo {
            table,
            id,
            previous,
        });
        self.records.push(JournalRecord::Put(row));
        Ok(())
    }

    /// Deletes a row, returning it if it existed.
    pub fn delete(&mut self, table: TableKind, id: EntityId) -> Option<Row> {
        let previous = self.tables.delete(table, &id)?;
        self.undo.push(Undo {
            table,
            id,
            previous: Some(previous.clone()),
        });
        self.records.push(JournalRecord::Delete { table, id });
        Some(previous)
    }

    /// Author of a post or comment, if it is stored.
    #[must_use]
    pub fn target_author(&self, kind: TargetKind, id: &EntityId) -> Option<PublicKey> {
        match kind {
            TargetKind::Post => self.tables.posts.get(id).map(|p| p.author_public_key),
            TargetKind::Comment => self.tables.comments.get(id).map(|c| c.author_public_key),
        }
    }

    /// Moves the counter matching `value` on a target by `delta`.
    ///
    /// Returns the new counters, or `None` if the target is not stored.
    /// Counters saturate at zero.
    pub fn adjust_votes(
        &mut self,
        kind: TargetKind,
        id: EntityId,
        value: VoteValue,
        delta: i64,
    ) -> CoreResult<Option<Counters>> {
        match kind {
            TargetKind::Post => {
                let Some(mut post) = self.tables.posts.get(&id).cloned() else {
                    return Ok(None);
                };
                match value {
                    VoteValue::Up => bump(&mut post.upvotes, delta),
                    VoteValue::Down => bump(&mut post.downvotes, delta),
                }
                let counters = Counters {
                    upvotes: post.upvotes,
                    downvotes: post.downvotes,
                };
                self.put(post)?;
                Ok(Some(counters))
            }
            TargetKind::Comment => {
                let Some(mut comment) = self.tables.comments.get(&id).cloned() else {
                    return Ok(None);
                };
                match value {
                    VoteValue::Up => bump(&mut comment.upvotes, delta),
                    VoteValue::Down => bump(&mut comment.downvotes, delta),
                }
                let counters = Counters {
                    upvotes: comment.upvotes,
                    downvotes: comment.downvotes,
                };
                self.put(comment)?;
                Ok(Some(counters))
            }
        }
    }

    /// Current counters of a target.
    #[must_use]
    pub fn counters(&self, kind: TargetKind, id: &EntityId) -> Option<Counters> {
        match kind {
            TargetKind::Post => self.tables.posts.get(id).map(|p| Counters {
                upvotes: p.upvotes,
                downvotes: p.downvotes,
            }),
            TargetKind::Comment => self.tables.comments.get(id).map(|c| Counters {
                upvotes: c.upvotes,
                downvotes: c.downvotes,
            }),
        }
    }

    /// Moves a post's comment count by `delta`. Returns false if the post
    /// is not stored.
    pub fn adjust_comment_count(&mut self, post_id: EntityId, delta: i64) -> CoreResult<bool> {
        let Some(mut post) = self.tables.posts.get(&post_id).cloned() else {
            return Ok(false);
        };
        bump(&mut post.comment_count, delta);
        self.put(post)?;
        Ok(true)
    }

    /// Records a notification for `recipient`, unless they caused it.
    pub fn notify(
        &mut self,
        recipient: PublicKey,
        source: PublicKey,
        target_id: EntityId,
        target_kind: TargetKind,
        action: NotificationAction,
    ) -> CoreResult<Option<Notification>> {
        if recipient == source {
            return Ok(None);
        }
        let notification = Notification {
            id: EntityId::new(),
            recipient_public_key: recipient,
            source_public_key: source,
            target_id,
            target_kind,
            action,
            is_read: false,
            created_at: self.now,
            expires_at: self.now.saturating_add(self.notification_ttl),
        };
        tracing::debug!(
            recipient = %recipient,
            action = ?action,
            target = %target_id,
            "notification created"
        );
        self.put(notification.clone())?;
        Ok(Some(notification))
    }

    pub(crate) fn pending(&self) -> &[JournalRecord] {
        &self.records
    }

    pub(crate) fn rollback(self) {
        for undo in self.undo.into_iter().rev() {
            match undo.previous {
                Some(row) => {
                    if let Err(e) = self.tables.put(row) {
                        tracing::error!(
                            table = %undo.table,
                            id = %undo.id,
                            error = %e,
                            "rollback failed"
                        );
                    }
                }
                None => {
                    self.tables.delete(undo.table, &undo.id);
                }
            }
        }
    }
}

fn bump(counter: &mut u64, delta: i64) {
    if delta >= 0 {
        *counter = counter.saturating_add(delta.unsigned_abs());
    } else {
        *counter = counter.saturating_sub(delta.unsigned_abs());
    }
}
