//! The overlay seam and an in-memory loopback overlay.

use crate::error::{SyncError, SyncResult};
use murmur_sync_protocol::RecordKey;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One record as delivered by the overlay.
///
/// The key is kept as raw text; it is parsed and validated by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRecord {
    /// Key the record was published under, e.g. `posts/<id>`.
    pub key: String,
    /// Encoded record.
    pub payload: Vec<u8>,
}

/// Best-effort view of overlay connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStatus {
    /// Whether the node is attached to the overlay.
    pub connected: bool,
    /// Number of reachable peers.
    pub peer_count: usize,
}

impl NetworkStatus {
    /// The status of a detached node.
    pub const OFFLINE: Self = Self {
        connected: false,
        peer_count: 0,
    };
}

/// An unordered, at-least-once, best-effort broadcast substrate.
///
/// Implementations may drop, reorder or repeat deliveries; the engine
/// dedupes and verifies everything it receives.
pub trait Overlay: Send + Sync {
    /// Broadcasts an encoded record under `key`.
    ///
    /// Success means the overlay accepted the record, not that any peer
    /// received it.
    fn publish(&self, key: &RecordKey, payload: Vec<u8>) -> SyncResult<()>;

    /// Starts inbound delivery, replacing any earlier subscription.
    fn subscribe(&self, buffer: usize) -> SyncResult<mpsc::Receiver<InboundRecord>>;

    /// Stops inbound delivery and detaches from the overlay. Idempotent.
    fn unsubscribe(&self) -> SyncResult<()>;

    /// Reports current connectivity.
    fn status(&self) -> NetworkStatus;
}

#[derive(Debug, Default)]
struct Peer {
    online: bool,
    inbox: Option<mpsc::Sender<InboundRecord>>,
}

/// Shared broker connecting [`LoopbackOverlay`] instances in one process.
///
/// Every published record is offered to every other online, subscribed
/// peer. A full inbox drops the record, as a real gossip layer would.
#[derive(Debug, Clone, Default)]
pub struct LoopbackNetwork {
    peers: Arc<Mutex<BTreeMap<u64, Peer>>>,
    next_id: Arc<AtomicU64>,
}

impl LoopbackNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new node. The node starts online but unsubscribed.
    pub fn join(&self) -> LoopbackOverlay {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.peers.lock().insert(
            id,
            Peer {
                online: true,
                inbox: None,
            },
        );
        LoopbackOverlay {
            id,
            network: self.clone(),
        }
    }

    /// Number of nodes currently online.
    pub fn online_count(&self) -> usize {
        self.peers.lock().values().filter(|p| p.online).count()
    }
}

/// One node's handle on a [`LoopbackNetwork`].
#[derive(Debug)]
pub struct LoopbackOverlay {
    id: u64,
    network: LoopbackNetwork,
}

impl LoopbackOverlay {
    /// Simulates losing or regaining connectivity without touching the
    /// subscription.
    pub fn set_online(&self, online: bool) {
        if let Some(peer) = self.network.peers.lock().get_mut(&self.id) {
            peer.online = online;
        }
    }
}

impl Overlay for LoopbackOverlay {
    fn publish(&self, key: &RecordKey, payload: Vec<u8>) -> SyncResult<()> {
        let mut peers = self.network.peers.lock();
        if !peers.get(&self.id).is_some_and(|p| p.online) {
            return Err(SyncError::NotConnected);
        }

        let record = InboundRecord {
            key: key.to_string(),
            payload,
        };
        for (id, peer) in peers.iter_mut() {
            if *id == self.id || !peer.online {
                continue;
            }
            let Some(inbox) = &peer.inbox else {
                continue;
            };
            match inbox.try_send(record.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(peer = id, key = %key, "loopback inbox full, dropping record");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    peer.inbox = None;
                }
            }
        }
        Ok(())
    }

    fn subscribe(&self, buffer: usize) -> SyncResult<mpsc::Receiver<InboundRecord>> {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut peers = self.network.peers.lock();
        let peer = peers.entry(self.id).or_default();
        peer.online = true;
        peer.inbox = Some(tx);
        Ok(rx)
    }

    fn unsubscribe(&self) -> SyncResult<()> {
        if let Some(peer) = self.network.peers.lock().get_mut(&self.id) {
            peer.online = false;
            peer.inbox = None;
        }
        Ok(())
    }

    fn status(&self) -> NetworkStatus {
        let peers = self.network.peers.lock();
        if !peers.get(&self.id).is_some_and(|p| p.online) {
            return NetworkStatus::OFFLINE;
        }
        NetworkStatus {
            connected: true,
            peer_count: peers
                .iter()
                .filter(|(id, p)| **id != self.id && p.online)
                .count(),
        }
    }
}

impl Drop for LoopbackOverlay {
    fn drop(&mut self) {
        self.network.peers.lock().remove(&self.id);
    }
}
