//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, ALICE};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_get_owner_bookmark() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::as_user(server.base_url.clone(), ALICE);
//!
//!     let response = client.get_owner_bookmark(ALICE).await;
//!     assert_eq!(response.status(), StatusCode::NOT_FOUND);
//! }
//! ```

mod client;
mod constants;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
