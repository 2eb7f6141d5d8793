//! Per-identity purge, journal compaction and signature re-verification.

use super::ReplicaStore;
use crate::entity::{EntityId, TableKind};
use crate::error::CoreResult;
use crate::journal::JournalRecord;
use crate::tables::Row;
use murmur_identity::PublicKey;
use serde::Serialize;
use std::collections::BTreeSet;

/// Rows removed by [`ReplicaStore::purge_all_data_for`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    /// Posts removed.
    pub posts: usize,
    /// Comments removed.
    pub comments: usize,
    /// Votes removed, including other voters' votes on purged content.
    pub votes: usize,
    /// Notifications removed.
    pub notifications: usize,
    /// Retraction markers removed.
    pub retractions: usize,
}

impl PurgeReport {
    /// Total rows removed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.posts + self.comments + self.votes + self.notifications + self.retractions
    }
}

/// Result of [`ReplicaStore::compact`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    /// Live rows written to the new journal.
    pub rows: usize,
    /// Journal size before.
    pub bytes_before: u64,
    /// Journal size after.
    pub bytes_after: u64,
}

/// Result of [`ReplicaStore::verify_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifyReport {
    /// Signed records checked.
    pub checked: usize,
    /// Records whose signature no longer verifies.
    pub invalid: Vec<(TableKind, EntityId)>,
}

impl VerifyReport {
    /// Returns true if every record verified.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.invalid.is_empty()
    }
}

impl ReplicaStore {
    /// Deletes everything attributable to `identity` from this replica.
    ///
    /// Removes the identity's posts, comments and votes, the votes others
    /// cast on that content, and every notification sent to, caused by or
    /// pointing at it. Counters on surviving targets are corrected. When
    /// anything was removed the journal is then [compacted](Self::compact)
    /// so none of the purged bytes stay on disk. Other nodes that already
    /// ingested copies are unaffected.
    ///
    /// # Errors
    ///
    /// Returns the journal error if the deletion or the compaction fails.
    /// Purging again is safe.
    pub fn purge_all_data_for(&self, identity: &PublicKey) -> CoreResult<PurgeReport> {
        let report = self.write(|txn| {
            let mut report = PurgeReport::default();
            let mut purged: BTreeSet<EntityId> = BTreeSet::new();

            for id in txn.tables().votes.ids_by_author(identity) {
                if let Some(Row::Vote(vote)) = txn.delete(TableKind::Votes, id) {
                    txn.adjust_votes(vote.target_kind, vote.target_id, vote.value, -1)?;
                    report.votes += 1;
                }
            }

            for id in txn.tables().comments.ids_by_author(identity) {
                if let Some(Row::Comment(comment)) = txn.delete(TableKind::Comments, id) {
                    txn.adjust_comment_count(comment.post_id, -1)?;
                    purged.insert(id);
                    report.comments += 1;
                }
            }

            let post_ids: Vec<EntityId> = txn
                .tables()
                .posts
                .by_author(identity)
                .iter()
                .map(|p| p.id)
                .collect();
            for id in post_ids {
                if txn.delete(TableKind::Posts, id).is_some() {
                    purged.insert(id);
                    report.posts += 1;
                }
            }

            for target in &purged {
                for id in txn.tables().votes.ids_by_target(target) {
                    if txn.delete(TableKind::Votes, id).is_some() {
                        report.votes += 1;
                    }
                }
            }

            let notification_ids: Vec<EntityId> = txn
                .tables()
                .notifications
                .iter()
                .filter(|n| {
                    n.recipient_public_key == *identity
                        || n.source_public_key == *identity
                        || purged.contains(&n.target_id)
                })
                .map(|n| n.id)
                .collect();
            for id in notification_ids {
                txn.delete(TableKind::Notifications, id);
                report.notifications += 1;
            }

            for id in txn.tables().retractions.ids_by_voter(identity) {
                txn.delete(TableKind::Retractions, id);
                report.retractions += 1;
            }

            Ok(report)
        })?;

        tracing::info!(
            identity = %identity,
            posts = report.posts,
            comments = report.comments,
            votes = report.votes,
            notifications = report.notifications,
            retractions = report.retractions,
            "purged identity data"
        );

        if report.total() > 0 {
            self.compact()?;
        }
        Ok(report)
    }

    /// Rewrites the journal as one batch of the live rows.
    ///
    /// Deleted rows, superseded versions and swept notifications stop
    /// occupying the journal. Writers are blocked for the duration.
    pub fn compact(&self) -> CoreResult<CompactionReport> {
        let mut journal = self.journal.lock();
        let tables = self.tables.read();

        let batch: Vec<JournalRecord> = tables.rows().map(JournalRecord::Put).collect();
        let bytes_before = journal.size()?;
        journal.rewrite(&batch)?;
        let report = CompactionReport {
            rows: batch.len(),
            bytes_before,
            bytes_after: journal.size()?,
        };

        tracing::info!(
            rows = report.rows,
            bytes_before = report.bytes_before,
            bytes_after = report.bytes_after,
            "journal compacted"
        );
        Ok(report)
    }

    /// Re-verifies the signature of every stored post, comment and vote.
    #[must_use]
    pub fn verify_all(&self) -> VerifyReport {
        let tables = self.tables.read();
        let mut report = VerifyReport::default();

        for post in tables.posts.iter() {
            report.checked += 1;
            if !post.verify_signature() {
                report.invalid.push((TableKind::Posts, post.id));
            }
        }
        for comment in tables.comments.iter() {
            report.checked += 1;
            if !comment.verify_signature() {
                report.invalid.push((TableKind::Comments, comment.id));
            }
        }
        for vote in tables.votes.iter() {
            report.checked += 1;
            if !vote.verify_signature() {
                report.invalid.push((TableKind::Votes, vote.id));
            }
        }

        if !report.is_clean() {
            tracing::warn!(
                invalid = report.invalid.len(),
                "stored records failed verification"
            );
        }
        report
    }
}
