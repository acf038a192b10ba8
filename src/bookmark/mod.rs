mod models;
mod schema;
mod store;
mod trait_def;

pub use models::{Bookmark, BookmarkField, BookmarkId, PostRef, Projection};
pub use store::SqliteBookmarkStore;
pub use trait_def::BookmarkStore;
