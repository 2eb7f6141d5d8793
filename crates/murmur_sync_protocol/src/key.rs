//! Record kinds and keys.

use crate::error::{ProtocolError, ProtocolResult};
use murmur_core::EntityId;
use std::fmt;
use std::str::FromStr;

/// The replicated entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A post.
    Post,
    /// A comment.
    Comment,
    /// A vote.
    Vote,
}

impl EntityKind {
    /// All kinds, in namespace order.
    pub const ALL: [Self; 3] = [Self::Post, Self::Comment, Self::Vote];

    /// The key namespace for this kind.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::Post => "posts",
            Self::Comment => "comments",
            Self::Vote => "votes",
        }
    }

    /// Looks up a kind by namespace.
    #[must_use]
    pub fn from_namespace(namespace: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.namespace() == namespace)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Vote => "vote",
        })
    }
}

/// The key a record is published under: `<namespace>/<id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordKey {
    /// Entity kind, selecting the namespace.
    pub kind: EntityKind,
    /// Entity id.
    pub id: EntityId,
}

impl RecordKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    /// Parses a key.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidKey`] for an unknown namespace, a
    /// missing separator or an id that is not a UUID.
    pub fn parse(text: &str) -> ProtocolResult<Self> {
        let (namespace, id) = text
            .split_once('/')
            .ok_or_else(|| ProtocolError::invalid_key(text, "missing '/' separator"))?;
        let kind = EntityKind::from_namespace(namespace).ok_or_else(|| {
            ProtocolError::invalid_key(text, format!("unknown namespace {namespace:?}"))
        })?;
        let id = id
            .parse::<EntityId>()
            .map_err(|e| ProtocolError::invalid_key(text, e.to_string()))?;
        Ok(Self { kind, id })
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.namespace(), self.id)
    }
}

impl FromStr for RecordKey {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let id = EntityId::new();
        let key = RecordKey::new(EntityKind::Comment, id);
        let text = key.to_string();
        assert_eq!(text, format!("comments/{id}"));
        assert_eq!(text.parse::<RecordKey>().unwrap(), key);
    }

    #[test]
    fn rejects_bad_keys() {
        let id = EntityId::new();
        for bad in [
            String::new(),
            "posts".to_string(),
            format!("notifications/{id}"),
            format!("post/{id}"),
            "votes/not-a-uuid".to_string(),
            format!("/{id}"),
        ] {
            assert!(
                matches!(RecordKey::parse(&bad), Err(ProtocolError::InvalidKey { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn namespaces() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_namespace(kind.namespace()), Some(kind));
        }
        assert_eq!(EntityKind::from_namespace("POSTS"), None);
    }
}
