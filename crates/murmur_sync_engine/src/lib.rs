//! # murmur sync engine
//!
//! Replication of a murmur replica over a best-effort gossip overlay.
//!
//! This crate provides:
//! - The [`Overlay`] seam a transport plugs into
//! - [`SyncEngine`]: outbound publication, inbound ingestion, periodic
//!   re-announcement, network status and disconnect
//! - An in-memory [`LoopbackNetwork`] for tests and simulations
//!
//! ## Architecture
//!
//! Local writes go to the [`ReplicaStore`](murmur_core::ReplicaStore) first
//! and are then handed to the overlay. Inbound records travel the other
//! way: the key and payload are decoded into a
//! [`RemoteRecord`](murmur_sync_protocol::RemoteRecord) at the boundary,
//! then the store dedupes, verifies and merges them. Each inbound record is
//! ingested on its own blocking task.
//!
//! ## Key Invariants
//!
//! - Local writes never depend on the network
//! - A failed publish leaves local state untouched
//! - Inbound failures are logged and dropped, never propagated
//! - Ingesting the same record twice is a no-op

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod overlay;
mod state;

pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use overlay::{InboundRecord, LoopbackNetwork, LoopbackOverlay, NetworkStatus, Overlay};
pub use state::{Ingest, SyncState, SyncStats};
