//! Engine state and statistics.

use std::time::Instant;

/// The lifecycle state of a [`SyncEngine`](crate::SyncEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Created but not started. Publishing and manual resync work.
    Idle,
    /// Subscribed to the overlay with background loops running.
    Running,
    /// Unsubscribed and offline. Publishing fails until restarted.
    Disconnected,
}

impl SyncState {
    /// Returns true if the engine may hand records to the overlay.
    pub fn is_online(&self) -> bool {
        !matches!(self, SyncState::Disconnected)
    }

    /// Returns true if [`SyncEngine::start`](crate::SyncEngine::start) is allowed.
    pub fn can_start(&self) -> bool {
        matches!(self, SyncState::Idle | SyncState::Disconnected)
    }
}

/// What happened to one inbound delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Stored, with side effects applied.
    Admitted,
    /// Already held; nothing changed.
    Duplicate,
    /// A newer vote for the same voter and target is already held.
    Stale,
    /// Malformed key or payload, or a failed signature check.
    Rejected,
    /// The store could not take the record.
    Failed,
}

/// Statistics about sync operations.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Records handed to the overlay.
    pub published: u64,
    /// Records the overlay refused.
    pub publish_failures: u64,
    /// Inbound records admitted to the store.
    pub ingested: u64,
    /// Inbound records already held.
    pub duplicates: u64,
    /// Inbound votes superseded by a held vote.
    pub stale: u64,
    /// Inbound records discarded at the boundary or by verification.
    pub rejected: u64,
    /// Inbound records lost to store errors.
    pub ingest_failures: u64,
    /// Completed resync rounds.
    pub resync_rounds: u64,
    /// Time of the last resync round.
    pub last_resync: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

impl SyncStats {
    pub(crate) fn record_ingest(&mut self, outcome: Ingest) {
        match outcome {
            Ingest::Admitted => self.ingested += 1,
            Ingest::Duplicate => self.duplicates += 1,
            Ingest::Stale => self.stale += 1,
            Ingest::Rejected => self.rejected += 1,
            Ingest::Failed => self.ingest_failures += 1,
        }
    }

    /// Total inbound deliveries seen.
    pub fn delivered(&self) -> u64 {
        self.ingested + self.duplicates + self.stale + self.rejected + self.ingest_failures
    }
}
