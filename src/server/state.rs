use axum::extract::FromRef;

use crate::bookmark_manager::BookmarkManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedBookmarkManager = Arc<BookmarkManager>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub bookmark_manager: GuardedBookmarkManager,
}

impl ServerState {
    pub fn new(config: ServerConfig, bookmark_manager: BookmarkManager) -> Self {
        ServerState {
            config,
            start_time: Instant::now(),
            bookmark_manager: Arc::new(bookmark_manager),
        }
    }
}

impl FromRef<ServerState> for GuardedBookmarkManager {
    fn from_ref(input: &ServerState) -> Self {
        input.bookmark_manager.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
