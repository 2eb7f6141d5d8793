//! Small enumerations shared by the entity schemas.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The logical tables of a replica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    /// Posts.
    Posts,
    /// Comments.
    Comments,
    /// Votes.
    Votes,
    /// Notifications.
    Notifications,
    /// Markers for votes this node retracted.
    Retractions,
}

impl TableKind {
    /// Singular name of a row in this table.
    #[must_use]
    pub const fn row_name(self) -> &'static str {
        match self {
            Self::Posts => "post",
            Self::Comments => "comment",
            Self::Votes => "vote",
            Self::Notifications => "notification",
            Self::Retractions => "retraction",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.row_name())
    }
}

/// What a vote or notification points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// A post.
    Post,
    /// A comment.
    Comment,
}

impl TargetKind {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
        }
    }

    /// Returns the table holding targets of this kind.
    #[must_use]
    pub const fn table(self) -> TableKind {
        match self {
            Self::Post => TableKind::Posts,
            Self::Comment => TableKind::Comments,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Polarity of a vote: `+1` or `-1` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum VoteValue {
    /// `+1`
    Up,
    /// `-1`
    Down,
}

impl VoteValue {
    /// Returns the signed integer form.
    #[must_use]
    pub const fn as_i8(self) -> i8 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Returns the opposite polarity.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(format!("vote value must be +1 or -1, got {other}")),
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        value.as_i8()
    }
}

/// Why a notification was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    /// Someone replied to the recipient's post or comment.
    Reply,
    /// Someone upvoted the recipient's post or comment.
    Upvote,
}
