//! Notification schema.

use crate::clock::Timestamp;
use crate::entity::{EntityId, NotificationAction, TargetKind};
use murmur_identity::PublicKey;
use serde::{Deserialize, Serialize};

/// A local, unsigned side effect of a reply or upvote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Locally generated id.
    pub id: EntityId,
    /// Who the notification is for.
    pub recipient_public_key: PublicKey,
    /// Who caused it.
    pub source_public_key: PublicKey,
    /// The replied-to or upvoted entity.
    pub target_id: EntityId,
    /// Kind of the target.
    pub target_kind: TargetKind,
    /// What happened.
    pub action: NotificationAction,
    /// Read flag, the only mutable field.
    pub is_read: bool,
    /// Creation time.
    pub created_at: Timestamp,
    /// `created_at` plus the notification lifetime.
    pub expires_at: Timestamp,
}

impl Notification {
    /// Returns true if the notification may still be shown at `now`.
    #[must_use]
    pub fn is_visible_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_boundary() {
        let key = PublicKey::from_bytes([1; 32]);
        let n = Notification {
            id: EntityId::new(),
            recipient_public_key: key,
            source_public_key: key,
            target_id: EntityId::new(),
            target_kind: TargetKind::Post,
            action: NotificationAction::Reply,
            is_read: false,
            created_at: Timestamp(0),
            expires_at: Timestamp(100),
        };
        assert!(n.is_visible_at(Timestamp(99)));
        assert!(!n.is_visible_at(Timestamp(100)));
    }
}
