//! Bookmark domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a bookmark document.
///
/// The nil UUID is the "invalid id" sentinel produced by [`BookmarkId::parse_or_nil`]; it is
/// never assigned to a stored bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(Uuid);

impl BookmarkId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Parses a hyphenated or simple UUID, falling back to the nil id.
    pub fn parse_or_nil(s: &str) -> Self {
        Uuid::parse_str(s.trim()).map(Self).unwrap_or_else(|_| Self::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Reference to a post owned by the post service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    pub id: String,
    /// Display name, only ever filled in at read time by enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl PostRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }
}

/// One owner's collection of post references.
///
/// Projected-out fields are `None` on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<PostRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Bookmark {
    pub fn post_ids(&self) -> Vec<String> {
        self.posts
            .iter()
            .flatten()
            .map(|post| post.id.clone())
            .collect()
    }
}

/// Fields that can be left out of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmarkField {
    Posts,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
}

impl BookmarkField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim() {
            "posts" => Some(BookmarkField::Posts),
            "created_at" => Some(BookmarkField::CreatedAt),
            "updated_at" => Some(BookmarkField::UpdatedAt),
            "deleted_at" => Some(BookmarkField::DeletedAt),
            _ => None,
        }
    }
}

/// Field projection applied to reads. `id` and `owner_id` are always returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    excluded: Vec<BookmarkField>,
}

impl Projection {
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a projection from field names; names that do not match a field are ignored.
    pub fn excluding<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut excluded = Vec::new();
        for field in names
            .into_iter()
            .filter_map(|name| BookmarkField::from_name(name.as_ref()))
        {
            if !excluded.contains(&field) {
                excluded.push(field);
            }
        }
        Self { excluded }
    }

    pub fn includes(&self, field: BookmarkField) -> bool {
        !self.excluded.contains(&field)
    }
}
