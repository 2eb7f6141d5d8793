//! Entity schemas.
//!
//! Posts, comments and votes are signed over their immutable fields only, so
//! counter updates never invalidate a signature. Notifications are local
//! side effects and carry no signature. Retractions are local markers for
//! votes this node withdrew.

mod comment;
mod id;
mod kinds;
mod notification;
mod post;
mod retraction;
mod vote;

pub use comment::Comment;
pub use id::EntityId;
pub use kinds::{NotificationAction, TableKind, TargetKind, VoteValue};
pub use notification::Notification;
pub use post::Post;
pub use retraction::Retraction;
pub use vote::{Vote, VoteKey};
