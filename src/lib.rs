//! Bookmark Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod auth;
pub mod bookmark;
pub mod bookmark_manager;
pub mod config;
pub mod post_service;
pub mod server;
pub mod sqlite_persistence;
pub mod status;

// Re-export commonly used types for convenience
pub use bookmark::{BookmarkStore, SqliteBookmarkStore};
pub use bookmark_manager::BookmarkManager;
pub use server::{make_app, run_server, RequestsLoggingLevel};
pub use status::{OperationError, OperationResult, OperationStatus, Outcome};
