//! # murmur core
//!
//! The local replica store of a murmur node.
//!
//! This crate provides:
//! - Entity schemas for posts, comments, votes and notifications
//! - Typed tables with secondary indexes
//! - An append-only journal replayed on open and compacted on demand
//! - Toggle voting, reply and upvote notifications, expiry sweep and
//!   per-identity purge
//! - The admission path for records replicated from other nodes
//!
//! ## Example
//!
//! ```rust
//! use murmur_core::{ReplicaStore, TargetKind, VoteState, VoteValue};
//! use murmur_identity::{KdfParams, Session};
//!
//! let store = ReplicaStore::open_in_memory().unwrap();
//! let alice = Session::generate(&KdfParams::fast_for_tests()).unwrap();
//! let bob = Session::generate(&KdfParams::fast_for_tests()).unwrap();
//!
//! let post = store.create_post(&alice, b"hi").unwrap();
//! let outcome = store
//!     .cast_vote(&bob, post.id, TargetKind::Post, VoteValue::Up)
//!     .unwrap();
//! assert_eq!(outcome.state, VoteState::Cast);
//! assert_eq!(store.get_post(&post.id).unwrap().upvotes, 1);
//! assert_eq!(store.list_notifications(&alice.public_key()).len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod config;
mod entity;
mod error;
mod index;
mod journal;
mod store;
mod tables;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use config::{StoreConfig, DEFAULT_NOTIFICATION_TTL};
pub use entity::{
    Comment, EntityId, Notification, NotificationAction, Post, Retraction, TableKind, TargetKind,
    Vote, VoteKey, VoteValue,
};
pub use error::{CoreError, CoreResult};
pub use index::{MultiIndex, UniqueIndex};
pub use journal::{Journal, JournalRecord, Replay};
pub use store::{
    Admission, CompactionReport, Counters, PurgeReport, ReplicaStore, StoreCounts, VerifyReport,
    VoteOutcome, VoteState, WriteTxn,
};
pub use tables::{
    CommentTable, NotificationTable, PostTable, RetractionTable, Row, Tables, VoteTable,
};
