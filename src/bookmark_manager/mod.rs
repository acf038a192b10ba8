mod manager;
mod pagination;
mod requests;

pub use manager::BookmarkManager;
pub use pagination::{Pagination, DEFAULT_PER_PAGE};
pub use requests::{PostPayload, PostsRequest};
