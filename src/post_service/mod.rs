mod client;
mod models;

pub use client::{HttpPostLookupClient, PostLookup, PostLookupError};
pub use models::{LookupRequest, LookupResponse, PostRecord};
