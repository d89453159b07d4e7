//! Cache key for document lookups.

use std::fmt;

use crate::domain::entities::Document;

/// Identifies a document either by its store-assigned id or by its unique
/// name.
///
/// The two variants never compare equal, even when they address the same
/// record: an id lookup and a name lookup occupy separate cache entries, so
/// writers must invalidate both (see [`DocumentKey::for_document`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    Id(i64),
    Name(String),
}

impl DocumentKey {
    pub fn id(id: i64) -> Self {
        Self::Id(id)
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn is_id(&self) -> bool {
        matches!(self, Self::Id(_))
    }

    pub fn is_name(&self) -> bool {
        matches!(self, Self::Name(_))
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(_) => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Self::Id(_) => None,
            Self::Name(name) => Some(name),
        }
    }

    /// Every key that can address `document`.
    pub fn for_document(document: &Document) -> [DocumentKey; 2] {
        [Self::Id(document.id), Self::Name(document.name.clone())]
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id:{id}"),
            Self::Name(name) => write!(f, "name:{name}"),
        }
    }
}
