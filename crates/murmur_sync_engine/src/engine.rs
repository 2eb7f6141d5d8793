//! The replication engine.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::overlay::{InboundRecord, NetworkStatus, Overlay};
use crate::state::{Ingest, SyncState, SyncStats};
use murmur_core::{
    Admission, Comment, EntityId, Post, ReplicaStore, TargetKind, VoteOutcome, VoteValue,
};
use murmur_identity::{PublicKey, Session};
use murmur_sync_protocol::{RecordKey, RemoteRecord};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Replicates one node's store over an [`Overlay`].
///
/// The engine is usable without a runtime for publishing, manual
/// [`resync`](Self::resync) and direct
/// [`on_remote_entity`](Self::on_remote_entity) calls. [`start`](Self::start)
/// needs a Tokio runtime and spawns the inbound and maintenance loops.
pub struct SyncEngine {
    shared: Arc<Shared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

struct Shared {
    store: Arc<ReplicaStore>,
    overlay: Arc<dyn Overlay>,
    identity: PublicKey,
    config: SyncConfig,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
}

impl SyncEngine {
    /// Creates an idle engine for the node owned by `identity`.
    pub fn new(
        store: Arc<ReplicaStore>,
        overlay: Arc<dyn Overlay>,
        identity: PublicKey,
        config: SyncConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                overlay,
                identity,
                config,
                state: RwLock::new(SyncState::Idle),
                stats: RwLock::new(SyncStats::default()),
            }),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// The replicated store.
    pub fn store(&self) -> &Arc<ReplicaStore> {
        &self.shared.store
    }

    /// The identity whose posts are re-announced.
    pub fn identity(&self) -> PublicKey {
        self.shared.identity
    }

    /// The engine configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.shared.config
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.shared.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.shared.stats.read().clone()
    }

    /// Hands a locally created record to the overlay.
    ///
    /// Fire-and-forget: an `Ok` only means the overlay accepted the record.
    /// A failure is logged and counted and never touches local state; own
    /// posts get another chance on the next resync round.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::PublishFailed`] if the engine is disconnected or
    /// the overlay refused the record.
    pub fn publish(&self, record: impl Into<RemoteRecord>) -> SyncResult<()> {
        self.shared.publish(&record.into())
    }

    /// Creates a post locally, then publishes it.
    ///
    /// The post is returned even if publishing fails.
    pub fn create_post(&self, session: &Session, content: &[u8]) -> SyncResult<Post> {
        let post = self.shared.store.create_post(session, content)?;
        if let Err(e) = self.publish(post.clone()) {
            debug!(id = %post.id, error = %e, "post kept local, publish failed");
        }
        Ok(post)
    }

    /// Creates a comment locally, then publishes it.
    pub fn create_comment(
        &self,
        session: &Session,
        post_id: EntityId,
        content: &[u8],
        parent_comment_id: Option<EntityId>,
    ) -> SyncResult<Comment> {
        let comment = self
            .shared
            .store
            .create_comment(session, post_id, content, parent_comment_id)?;
        if let Err(e) = self.publish(comment.clone()) {
            debug!(id = %comment.id, error = %e, "comment kept local, publish failed");
        }
        Ok(comment)
    }

    /// Toggles a vote locally, then publishes the vote left in place.
    ///
    /// A retraction leaves no vote behind and publishes nothing.
    pub fn cast_vote(
        &self,
        session: &Session,
        target_id: EntityId,
        target_kind: TargetKind,
        value: VoteValue,
    ) -> SyncResult<VoteOutcome> {
        let outcome = self
            .shared
            .store
            .cast_vote(session, target_id, target_kind, value)?;
        match &outcome.vote {
            Some(vote) => {
                if let Err(e) = self.publish(vote.clone()) {
                    debug!(id = %vote.id, error = %e, "vote kept local, publish failed");
                }
            }
            None => debug!(target = %target_id, "vote retracted locally, nothing to publish"),
        }
        Ok(outcome)
    }

    /// Ingests one delivery from the overlay.
    ///
    /// Never fails: malformed keys and payloads, bad signatures and store
    /// errors are logged, counted and dropped. Delivering the same record
    /// again is a no-op.
    pub fn on_remote_entity(&self, key: &str, payload: &[u8]) -> Ingest {
        self.shared.ingest(key, payload)
    }

    /// Re-announces this node's own posts from the resync window.
    ///
    /// Returns how many the overlay accepted. Skipped while offline.
    pub fn resync(&self) -> usize {
        self.shared.resync()
    }

    /// Best-effort connectivity report. Never gates store operations.
    pub fn network_status(&self) -> NetworkStatus {
        if !self.state().is_online() {
            return NetworkStatus::OFFLINE;
        }
        self.shared.overlay.status()
    }

    /// Subscribes to the overlay and spawns the background loops.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateTransition`] if already running,
    /// [`SyncError::Runtime`] outside a Tokio runtime, or the overlay's
    /// subscribe error.
    pub fn start(&self) -> SyncResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| SyncError::runtime(e.to_string()))?;

        let inbound = {
            let mut state = self.shared.state.write();
            if !state.can_start() {
                return Err(SyncError::InvalidStateTransition {
                    from: format!("{:?}", *state),
                    to: "Running".into(),
                });
            }
            let inbound = self
                .shared
                .overlay
                .subscribe(self.shared.config.inbound_buffer)?;
            *state = SyncState::Running;
            inbound
        };

        let mut tasks = self.tasks.lock();
        tasks.push(runtime.spawn(inbound_loop(Arc::clone(&self.shared), inbound)));
        if let Some(period) = self.shared.config.resync_interval {
            tasks.push(runtime.spawn(maintenance_loop(Arc::clone(&self.shared), period)));
        }

        info!(identity = %self.shared.identity, "sync engine started");
        Ok(())
    }

    /// Unsubscribes from the overlay, halts the background loops and marks
    /// the node offline. Idempotent.
    ///
    /// Ingestion tasks already in flight run to completion.
    pub fn disconnect(&self) {
        let previous = std::mem::replace(&mut *self.shared.state.write(), SyncState::Disconnected);
        self.abort_tasks();
        if previous == SyncState::Disconnected {
            return;
        }

        if let Err(e) = self.shared.overlay.unsubscribe() {
            warn!(error = %e, "overlay unsubscribe failed");
        }
        info!(identity = %self.shared.identity, "disconnected from overlay");
    }

    fn abort_tasks(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}

impl Drop for SyncEngine {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("identity", &self.shared.identity)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn publish(&self, record: &RemoteRecord) -> SyncResult<()> {
        let key = record.key();
        let result = if self.state.read().is_online() {
            record
                .encode()
                .map_err(SyncError::from)
                .and_then(|payload| self.overlay.publish(&key, payload))
        } else {
            Err(SyncError::NotConnected)
        };

        match result {
            Ok(()) => {
                self.stats.write().published += 1;
                debug!(key = %key, "published");
                Ok(())
            }
            Err(e) => {
                {
                    let mut stats = self.stats.write();
                    stats.publish_failures += 1;
                    stats.last_error = Some(e.to_string());
                }
                warn!(key = %key, error = %e, "publish failed, record kept locally");
                Err(SyncError::publish_failed(key.to_string(), e.to_string()))
            }
        }
    }

    fn ingest(&self, key: &str, payload: &[u8]) -> Ingest {
        let outcome = self.admit(key, payload);
        self.stats.write().record_ingest(outcome);
        outcome
    }

    fn admit(&self, key: &str, payload: &[u8]) -> Ingest {
        let record = match RecordKey::parse(key).and_then(|k| RemoteRecord::decode(&k, payload)) {
            Ok(record) => record,
            Err(e) => {
                warn!(key, error = %e, "discarding malformed record");
                return Ingest::Rejected;
            }
        };

        let kind = record.kind();
        let id = record.id();
        let result = match record {
            RemoteRecord::Post(post) => self.store.admit_post(post),
            RemoteRecord::Comment(comment) => self.store.admit_comment(comment),
            RemoteRecord::Vote(vote) => self.store.admit_vote(vote),
        };

        match result {
            Ok(Admission::Admitted) => {
                debug!(%kind, %id, "admitted remote record");
                Ingest::Admitted
            }
            Ok(Admission::Duplicate) => {
                debug!(%kind, %id, "duplicate delivery");
                Ingest::Duplicate
            }
            Ok(Admission::Stale) => {
                debug!(%kind, %id, "superseded vote ignored");
                Ingest::Stale
            }
            Err(e) if e.is_integrity_failure() => {
                warn!(%kind, %id, error = %e, "discarding record that failed verification");
                Ingest::Rejected
            }
            Err(e) => {
                error!(%kind, %id, error = %e, "store refused remote record");
                self.stats.write().last_error = Some(e.to_string());
                Ingest::Failed
            }
        }
    }

    fn resync(&self) -> usize {
        if !self.state.read().is_online() || !self.overlay.status().connected {
            debug!("offline, skipping resync");
            return 0;
        }

        let since = self.store.now().saturating_sub(self.config.resync_window);
        let posts = self.store.list_recent_posts_by_author(&self.identity, since);
        let total = posts.len();
        let sent = posts
            .into_iter()
            .filter(|post| self.publish(&RemoteRecord::Post(post.clone())).is_ok())
            .count();

        {
            let mut stats = self.stats.write();
            stats.resync_rounds += 1;
            stats.last_resync = Some(Instant::now());
        }
        debug!(sent, total, "resync round complete");
        sent
    }

    fn sweep(&self) {
        match self.store.sweep_expired() {
            Ok(0) => {}
            Ok(removed) => info!(removed, "expired notifications swept"),
            Err(e) => warn!(error = %e, "notification sweep failed"),
        }
    }
}

async fn inbound_loop(shared: Arc<Shared>, mut inbound: mpsc::Receiver<InboundRecord>) {
    let permits = Arc::new(Semaphore::new(shared.config.max_inbound_tasks.max(1)));
    while let Some(record) = inbound.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let shared = Arc::clone(&shared);
        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            shared.ingest(&record.key, &record.payload);
        });
    }
    debug!("inbound stream closed");
}

async fn maintenance_loop(shared: Arc<Shared>, period: Duration) {
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let round = Arc::clone(&shared);
        let result = tokio::task::spawn_blocking(move || {
            round.resync();
            if round.config.sweep_on_resync {
                round.sweep();
            }
        })
        .await;
        if let Err(e) = result {
            warn!(error = %e, "maintenance round aborted");
        }
    }
}
