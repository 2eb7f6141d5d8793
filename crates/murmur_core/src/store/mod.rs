//! The local replica store.
//!
//! A [`ReplicaStore`] holds the four tables in memory, journals every
//! committed change to a [`StorageBackend`] and rebuilds itself from that
//! journal on open.
//!
//! ## Concurrency
//!
//! Reads take a shared lock on the tables. Every mutation, local or
//! remote, runs inside [`ReplicaStore::write`]: a single-writer critical
//! section that holds the journal lock and the exclusive table lock for the
//! whole read-modify-write. Counter updates from a local vote and a
//! concurrently ingested remote vote therefore serialize instead of losing
//! an update.

mod local;
mod maintenance;
mod notifications;
mod remote;
mod txn;

pub use local::{VoteOutcome, VoteState};
pub use maintenance::{CompactionReport, PurgeReport, VerifyReport};
pub use remote::Admission;
pub use txn::{Counters, WriteTxn};

use crate::clock::{Clock, SystemClock, Timestamp};
use crate::config::StoreConfig;
use crate::entity::{Comment, EntityId, Post, TargetKind, Vote, VoteKey};
use crate::error::{CoreError, CoreResult};
use crate::journal::{Journal, JournalRecord};
use crate::tables::Tables;
use murmur_identity::{Envelope, PublicKey, Session};
use murmur_storage::{FileBackend, InMemoryBackend, StorageBackend};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    /// Stored posts.
    pub posts: usize,
    /// Stored comments.
    pub comments: usize,
    /// Stored votes.
    pub votes: usize,
    /// Stored notifications, including expired ones not yet swept.
    pub notifications: usize,
}

/// A node's local replica of posts, comments, votes and notifications.
pub struct ReplicaStore {
    config: StoreConfig,
    clock: Arc<dyn Clock>,
    tables: RwLock<Tables>,
    journal: Mutex<Journal>,
}

impl ReplicaStore {
    /// Opens a store over `backend` using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreUnavailable`] if the journal cannot be read
    /// or is corrupted beyond a torn tail.
    pub fn open(config: StoreConfig, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        Self::open_with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Opens a store over `backend` with an explicit clock.
    pub fn open_with_clock(
        config: StoreConfig,
        backend: Box<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let mut journal = Journal::new(backend, config.sync_on_write);
        let replay = journal
            .replay()
            .map_err(|e| CoreError::store_unavailable(format!("journal replay failed: {e}")))?;

        let mut tables = Tables::default();
        let batches = replay.batches.len();
        for batch in replay.batches {
            for record in batch {
                apply(&mut tables, record).map_err(|e| {
                    CoreError::store_unavailable(format!("journal replay failed: {e}"))
                })?;
            }
        }

        let store = Self {
            config,
            clock,
            tables: RwLock::new(tables),
            journal: Mutex::new(journal),
        };

        let counts = store.counts();
        tracing::info!(
            batches,
            truncated_bytes = replay.truncated_bytes,
            posts = counts.posts,
            comments = counts.comments,
            votes = counts.votes,
            notifications = counts.notifications,
            "replica store opened"
        );

        if store.config.sweep_on_open {
            store.sweep_expired()?;
        }
        Ok(store)
    }

    /// Opens a file-backed store at `path`.
    ///
    /// With `create_if_missing` unset, a missing journal file is an error.
    pub fn open_path(path: &Path, config: StoreConfig) -> CoreResult<Self> {
        let backend = if config.create_if_missing {
            FileBackend::open(path)
        } else {
            FileBackend::open_existing(path)
        }
        .map_err(|e| CoreError::store_unavailable(e.to_string()))?;
        Self::open(config, Box::new(backend))
    }

    /// Opens an empty, ephemeral store.
    pub fn open_in_memory() -> CoreResult<Self> {
        Self::open(StoreConfig::default(), Box::new(InMemoryBackend::new()))
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the store's notion of now.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Runs `f` inside the single-writer critical section.
    ///
    /// If `f` returns `Ok` its changes are journaled as one batch. If `f`
    /// fails, or the journal append fails, every change is undone.
    pub fn write<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut WriteTxn<'_>) -> CoreResult<T>,
    {
        let mut journal = self.journal.lock();
        let mut tables = self.tables.write();
        let mut txn = WriteTxn::new(&mut tables, self.clock.now(), self.config.notification_ttl);

        let value = match f(&mut txn) {
            Ok(value) => value,
            Err(e) => {
                txn.rollback();
                return Err(e);
            }
        };

        if txn.pending().is_empty() {
            return Ok(value);
        }
        if let Err(e) = journal.append(txn.pending()) {
            tracing::warn!(error = %e, "journal append failed, rolling back");
            txn.rollback();
            return Err(e);
        }
        Ok(value)
    }

    /// Decrypts content with the reader's session.
    ///
    /// # Errors
    ///
    /// Fails softly with `DecryptionFailed` when the envelope was sealed by
    /// another identity, and with `KeyNotInitialized` before the session's
    /// master key is derived. Stored records are never affected.
    pub fn read_content(&self, session: &Session, envelope: &Envelope) -> CoreResult<Vec<u8>> {
        Ok(session.decrypt(envelope)?)
    }

    /// Row counts per table.
    #[must_use]
    pub fn counts(&self) -> StoreCounts {
        let tables = self.tables.read();
        StoreCounts {
            posts: tables.posts.len(),
            comments: tables.comments.len(),
            votes: tables.votes.len(),
            notifications: tables.notifications.len(),
        }
    }

    /// Looks up a post.
    #[must_use]
    pub fn get_post(&self, id: &EntityId) -> Option<Post> {
        self.tables.read().posts.get(id).cloned()
    }

    /// Looks up a comment.
    #[must_use]
    pub fn get_comment(&self, id: &EntityId) -> Option<Comment> {
        self.tables.read().comments.get(id).cloned()
    }

    /// Looks up a vote by id.
    #[must_use]
    pub fn get_vote(&self, id: &EntityId) -> Option<Vote> {
        self.tables.read().votes.get(id).cloned()
    }

    /// Looks up the vote `voter` holds on a target.
    #[must_use]
    pub fn vote_for(
        &self,
        target_id: EntityId,
        target_kind: TargetKind,
        voter: PublicKey,
    ) -> Option<Vote> {
        let key = VoteKey {
            target_id,
            target_kind,
            voter,
        };
        self.tables.read().votes.by_key(&key).cloned()
    }

    /// All votes held on a target.
    #[must_use]
    pub fn list_votes_on(&self, target_id: &EntityId) -> Vec<Vote> {
        let tables = self.tables.read();
        tables
            .votes
            .ids_by_target(target_id)
            .iter()
            .filter_map(|id| tables.votes.get(id).cloned())
            .collect()
    }

    /// Newest posts first.
    #[must_use]
    pub fn list_latest(&self, limit: usize) -> Vec<Post> {
        self.tables
            .read()
            .posts
            .latest()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Highest `upvotes - downvotes` first; ties newest first.
    #[must_use]
    pub fn list_popular(&self, limit: usize) -> Vec<Post> {
        self.tables
            .read()
            .posts
            .popular(limit)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Posts by one author, newest first.
    #[must_use]
    pub fn list_posts_by_author(&self, author: &PublicKey) -> Vec<Post> {
        self.tables
            .read()
            .posts
            .by_author(author)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Posts by one author created at or after `since`, newest first.
    #[must_use]
    pub fn list_recent_posts_by_author(&self, author: &PublicKey, since: Timestamp) -> Vec<Post> {
        self.tables
            .read()
            .posts
            .by_author(author)
            .into_iter()
            .take_while(|p| p.created_at >= since)
            .cloned()
            .collect()
    }

    /// All comments on a post, oldest first.
    #[must_use]
    pub fn list_comments(&self, post_id: &EntityId) -> Vec<Comment> {
        self.tables
            .read()
            .comments
            .by_post(post_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Direct replies to a comment, oldest first.
    #[must_use]
    pub fn list_replies(&self, parent_comment_id: &EntityId) -> Vec<Comment> {
        self.tables
            .read()
            .comments
            .by_parent(parent_comment_id)
            .into_iter()
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for ReplicaStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicaStore")
            .field("counts", &self.counts())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn apply(tables: &mut Tables, record: JournalRecord) -> CoreResult<()> {
    match record {
        JournalRecord::Put(row) => {
            tables.put(row)?;
        }
        JournalRecord::Delete { table, id } => {
            tables.delete(table, &id);
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::clock::ManualClock;
    use murmur_storage::{StorageError, StorageResult};

    pub const T0: Timestamp = Timestamp(1_700_000_000_000);

    pub fn session() -> Session {
        Session::generate(&murmur_identity::KdfParams::fast_for_tests()).unwrap()
    }

    pub fn store_at(clock: Arc<ManualClock>) -> ReplicaStore {
        ReplicaStore::open_with_clock(
            StoreConfig::default(),
            Box::new(InMemoryBackend::new()),
            clock,
        )
        .unwrap()
    }

    pub fn store() -> (ReplicaStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T0));
        (store_at(clock.clone()), clock)
    }

    /// An in-memory backend whose next flush or append can be made to fail.
    /// Clones share the same bytes.
    #[derive(Debug, Clone, Default)]
    pub struct FlakyBackend {
        state: Arc<Mutex<FlakyState>>,
    }

    #[derive(Debug, Default)]
    struct FlakyState {
        data: Vec<u8>,
        fail_flush: bool,
        tear_append: bool,
    }

    impl FlakyBackend {
        pub fn data(&self) -> Vec<u8> {
            self.state.lock().data.clone()
        }

        pub fn fail_next_flush(&self) {
            self.state.lock().fail_flush = true;
        }

        /// The next append writes half its bytes, then fails.
        pub fn tear_next_append(&self) {
            self.state.lock().tear_append = true;
        }
    }

    impl StorageBackend for FlakyBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            let state = self.state.lock();
            let start = offset as usize;
            state
                .data
                .get(start..start + len)
                .map(<[u8]>::to_vec)
                .ok_or(StorageError::ReadPastEnd {
                    offset,
                    len,
                    size: state.data.len() as u64,
                })
        }

        fn append(&mut self, bytes: &[u8]) -> StorageResult<u64> {
            let mut state = self.state.lock();
            let offset = state.data.len() as u64;
            if std::mem::take(&mut state.tear_append) {
                state.data.extend_from_slice(&bytes[..bytes.len() / 2]);
                return Err(std::io::Error::other("device full").into());
            }
            state.data.extend_from_slice(bytes);
            Ok(offset)
        }

        fn flush(&mut self) -> StorageResult<()> {
            if std::mem::take(&mut self.state.lock().fail_flush) {
                return Err(std::io::Error::other("flush failed").into());
            }
            Ok(())
        }

        fn size(&self) -> StorageResult<u64> {
            Ok(self.state.lock().data.len() as u64)
        }

        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            self.state.lock().data.truncate(new_size as usize);
            Ok(())
        }

        fn replace(&mut self, bytes: &[u8]) -> StorageResult<()> {
            self.state.lock().data = bytes.to_vec();
            Ok(())
        }
    }
}
