//! Notification queries, read flags and the expiry sweep.

use super::ReplicaStore;
use crate::entity::{EntityId, Notification, TableKind};
use crate::error::{CoreError, CoreResult};
use murmur_identity::PublicKey;

impl ReplicaStore {
    /// Visible notifications for `recipient`, newest first.
    ///
    /// Entries with `now >= expires_at` are hidden even if the sweep has
    /// not removed them yet.
    #[must_use]
    pub fn list_notifications(&self, recipient: &PublicKey) -> Vec<Notification> {
        let now = self.now();
        let tables = self.tables.read();
        let mut out: Vec<Notification> = tables
            .notifications
            .for_recipient(recipient)
            .filter(|n| n.is_visible_at(now))
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        out
    }

    /// Number of visible unread notifications for `recipient`.
    #[must_use]
    pub fn unread_count(&self, recipient: &PublicKey) -> usize {
        let now = self.now();
        self.tables
            .read()
            .notifications
            .unread_for(recipient)
            .filter(|n| n.is_visible_at(now))
            .count()
    }

    /// Marks one notification read. Returns false if it already was.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no such notification is stored.
    pub fn mark_notification_read(&self, id: &EntityId) -> CoreResult<bool> {
        self.write(|txn| {
            let mut n = txn
                .tables()
                .notifications
                .get(id)
                .cloned()
                .ok_or_else(|| CoreError::not_found(TableKind::Notifications, *id))?;
            if n.is_read {
                return Ok(false);
            }
            n.is_read = true;
            txn.put(n)?;
            Ok(true)
        })
    }

    /// Marks every notification for `recipient` read, returning how many
    /// changed.
    pub fn mark_all_read(&self, recipient: &PublicKey) -> CoreResult<usize> {
        self.write(|txn| {
            let unread: Vec<Notification> = txn
                .tables()
                .notifications
                .unread_for(recipient)
                .cloned()
                .collect();
            let changed = unread.len();
            for mut n in unread {
                n.is_read = true;
                txn.put(n)?;
            }
            Ok(changed)
        })
    }

    /// Deletes every notification for `recipient`, returning how many were
    /// removed.
    pub fn clear_notifications(&self, recipient: &PublicKey) -> CoreResult<usize> {
        let removed = self.write(|txn| {
            let ids: Vec<EntityId> = txn
                .tables()
                .notifications
                .for_recipient(recipient)
                .map(|n| n.id)
                .collect();
            for id in &ids {
                txn.delete(TableKind::Notifications, *id);
            }
            Ok(ids.len())
        })?;
        tracing::info!(recipient = %recipient, removed, "notifications cleared");
        Ok(removed)
    }

    /// Deletes every notification with `expires_at <= now`.
    ///
    /// Idempotent; returns the number removed.
    pub fn sweep_expired(&self) -> CoreResult<usize> {
        let removed = self.write(|txn| {
            let expired = txn.tables().notifications.expired_at(txn.now());
            for id in &expired {
                txn.delete(TableKind::Notifications, *id);
            }
            Ok(expired.len())
        })?;
        if removed > 0 {
            tracing::info!(removed, "expired notifications swept");
        }
        Ok(removed)
    }
}
