//! BookmarkStore trait definition.

use super::models::{Bookmark, BookmarkId, Projection};
use crate::status::OperationResult;

/// Storage backend for bookmarks.
///
/// Every call resolves to an [`OperationStatus`](crate::status::OperationStatus), success
/// included. Soft-deleted bookmarks are invisible to every read and set mutation; only
/// [`update`](BookmarkStore::update) addresses them, by id.
pub trait BookmarkStore: Send + Sync {
    /// Live bookmarks, `limit` at most, after skipping `skip`. Fails with `FetchFailed`.
    fn fetch(
        &self,
        projection: &Projection,
        limit: usize,
        skip: usize,
    ) -> OperationResult<Vec<Bookmark>>;

    /// `NotExist` when no live bookmark has this id.
    fn fetch_by_id(&self, id: &BookmarkId, projection: &Projection) -> OperationResult<Bookmark>;

    /// `NotExist` when the owner has no live bookmark.
    fn fetch_by_owner(&self, owner_id: &str, projection: &Projection)
        -> OperationResult<Bookmark>;

    /// Inserts the bookmark and its posts atomically. `Duplicate` when the owner already has
    /// a live bookmark, `CreateFailed` on any other error.
    fn create(&self, bookmark: &Bookmark) -> OperationResult<BookmarkId>;

    /// Replaces the whole bookmark stored under `id`. `UpdateFailed` unless exactly one
    /// bookmark matched.
    fn update(&self, bookmark: &Bookmark, id: &BookmarkId) -> OperationResult<()>;

    /// Set-union of `post_ids` into the owner's posts, in one atomic mutation.
    /// Ids already present are skipped.
    fn add_posts(&self, owner_id: &str, post_ids: &[String]) -> OperationResult<()>;

    /// Set-difference of `post_ids` from the owner's posts, in one atomic mutation.
    fn revoke_posts(&self, owner_id: &str, post_ids: &[String]) -> OperationResult<()>;

    /// Hard delete. `NotExist` when nothing was removed.
    fn delete(&self, id: &BookmarkId) -> OperationResult<()>;

    fn new_id(&self) -> BookmarkId {
        BookmarkId::generate()
    }

    /// Parse failures yield the nil id, which callers must treat as invalid input.
    fn id_from_string(&self, s: &str) -> BookmarkId {
        BookmarkId::parse_or_nil(s)
    }
}
