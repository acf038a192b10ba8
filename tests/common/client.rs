//! HTTP client for end-to-end tests
//!
//! This module wraps reqwest and provides methods for all bookmark-server endpoints.
//! Requests carry the principal headers a gateway would normally inject.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::{RequestBuilder, Response};
use serde_json::json;
use std::time::Duration;

/// HTTP test client acting as one principal
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// `(user id, permission aliases)` sent with every request, if any
    principal: Option<(String, String)>,
}

impl TestClient {
    /// Creates a client that sends no principal headers
    pub fn anonymous(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            principal: None,
        }
    }

    /// Creates a client acting as `user_id` with every permission
    pub fn as_user(base_url: String, user_id: &str) -> Self {
        Self::with_permissions(base_url, user_id, ALL_PERMISSIONS)
    }

    /// Creates a client acting as `user_id` with the given permission aliases
    pub fn with_permissions(base_url: String, user_id: &str, permissions: &str) -> Self {
        let mut client = Self::anonymous(base_url);
        client.principal = Some((user_id.to_string(), permissions.to_string()));
        client
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.principal {
            Some((user_id, permissions)) => builder
                .header("X-User-Id", user_id)
                .header("X-User-Permissions", permissions),
            None => builder,
        }
    }

    fn posts_body(owner_id: &str, post_ids: &[&str]) -> serde_json::Value {
        json!({
            "owner_id": owner_id,
            "posts": post_ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
        })
    }

    // ========================================================================
    // Service Endpoints
    // ========================================================================

    /// GET / - service stats
    pub async fn get_stats(&self) -> Response {
        self.request(reqwest::Method::GET, "/")
            .send()
            .await
            .expect("Stats request failed")
    }

    // ========================================================================
    // Bookmark Endpoints
    // ========================================================================

    /// GET /api/bookmark?page=
    pub async fn list_bookmarks(&self, page: Option<&str>) -> Response {
        let path = match page {
            Some(page) => format!("/api/bookmark?page={}", page),
            None => "/api/bookmark".to_string(),
        };
        self.request(reqwest::Method::GET, &path)
            .send()
            .await
            .expect("List bookmarks request failed")
    }

    /// GET /api/bookmark/{id}?exclude=
    pub async fn get_bookmark(&self, id: &str, exclude: Option<&str>) -> Response {
        let path = match exclude {
            Some(fields) => format!("/api/bookmark/{}?exclude={}", id, fields),
            None => format!("/api/bookmark/{}", id),
        };
        self.request(reqwest::Method::GET, &path)
            .send()
            .await
            .expect("Get bookmark request failed")
    }

    /// GET /api/bookmark/u/{owner_id}
    pub async fn get_owner_bookmark(&self, owner_id: &str) -> Response {
        self.request(reqwest::Method::GET, &format!("/api/bookmark/u/{}", owner_id))
            .send()
            .await
            .expect("Get owner bookmark request failed")
    }

    /// POST /api/bookmark
    pub async fn create_bookmark(&self, owner_id: &str, post_ids: &[&str]) -> Response {
        self.request(reqwest::Method::POST, "/api/bookmark")
            .json(&Self::posts_body(owner_id, post_ids))
            .send()
            .await
            .expect("Create bookmark request failed")
    }

    /// PATCH /api/bookmark/post/{owner_id}
    pub async fn add_posts(&self, owner_id: &str, post_ids: &[&str]) -> Response {
        self.add_posts_for(owner_id, owner_id, post_ids).await
    }

    /// PATCH /api/bookmark/post/{path_owner} with a payload naming `body_owner`
    pub async fn add_posts_for(
        &self,
        path_owner: &str,
        body_owner: &str,
        post_ids: &[&str],
    ) -> Response {
        self.request(
            reqwest::Method::PATCH,
            &format!("/api/bookmark/post/{}", path_owner),
        )
        .json(&Self::posts_body(body_owner, post_ids))
        .send()
        .await
        .expect("Add posts request failed")
    }

    /// DELETE /api/bookmark/post/{owner_id}
    pub async fn revoke_posts(&self, owner_id: &str, post_ids: &[&str]) -> Response {
        self.request(
            reqwest::Method::DELETE,
            &format!("/api/bookmark/post/{}", owner_id),
        )
        .json(&Self::posts_body(owner_id, post_ids))
        .send()
        .await
        .expect("Revoke posts request failed")
    }

    /// PATCH /api/bookmark/post/{owner_id} with a raw JSON body
    pub async fn add_posts_raw(&self, owner_id: &str, body: serde_json::Value) -> Response {
        self.request(
            reqwest::Method::PATCH,
            &format!("/api/bookmark/post/{}", owner_id),
        )
        .json(&body)
        .send()
        .await
        .expect("Add posts request failed")
    }

    /// DELETE /api/bookmark/{id}
    pub async fn delete_bookmark(&self, id: &str) -> Response {
        self.request(reqwest::Method::DELETE, &format!("/api/bookmark/{}", id))
            .send()
            .await
            .expect("Delete bookmark request failed")
    }

    /// GET on an arbitrary path
    pub async fn get_path(&self, path: &str) -> Response {
        self.request(reqwest::Method::GET, path)
            .send()
            .await
            .expect("Request failed")
    }
}
