// Strong Types - identities used across the adventure graph
// Storage ids, adventure ids and slug permission modes as proper types

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Strongly-typed adventure row id
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AdventureId(pub i64);

impl AdventureId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for AdventureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AdventureId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Storage identity of a node or link row.
///
/// On the wire this is the numeric `id` field where `0` marks a row the
/// client created and the store has not assigned an id to yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RowId {
    #[default]
    Pending,
    Persisted(i64),
}

impl RowId {
    pub fn from_raw(raw: i64) -> Self {
        if raw == 0 {
            RowId::Pending
        } else {
            RowId::Persisted(raw)
        }
    }

    pub fn raw(self) -> i64 {
        match self {
            RowId::Pending => 0,
            RowId::Persisted(id) => id,
        }
    }

    pub fn persisted(self) -> Option<i64> {
        match self {
            RowId::Pending => None,
            RowId::Persisted(id) => Some(id),
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, RowId::Pending)
    }
}

impl Serialize for RowId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.raw())
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<i64>::deserialize(deserializer)?.unwrap_or(0);
        if raw < 0 {
            return Err(serde::de::Error::custom("storage id must not be negative"));
        }
        Ok(RowId::from_raw(raw))
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowId::Pending => write!(f, "pending"),
            RowId::Persisted(id) => write!(f, "{}", id),
        }
    }
}

/// Which slug column a lookup is allowed to match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Permission {
    /// Matches only the view slug
    #[default]
    ReadOnly,
    /// Matches only the edit slug
    ReadWrite,
    /// Matches either slug; the resolved permission is whichever matched
    Ignore,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ReadOnly => "read_only",
            Permission::ReadWrite => "read_write",
            Permission::Ignore => "ignore",
        }
    }
}
