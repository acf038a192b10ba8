mod guard;
mod permissions;

pub use guard::{
    allow_any, authorize, owner_only, Resource, ATTACH_POSTS, CREATE_BOOKMARK, DELETE_BOOKMARK,
    DETACH_POSTS,
};
pub use permissions::{Permission, Principal};
