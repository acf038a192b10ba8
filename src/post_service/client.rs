//! HTTP client for the external post service.

use super::models::{LookupRequest, LookupResponse, PostRecord};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum PostLookupError {
    #[error("Post service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Post service returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Lookup of post display data by id.
#[async_trait]
pub trait PostLookup: Send + Sync {
    /// Records for the ids the remote knows about. Unknown ids are simply absent.
    async fn fetch(&self, ids: &[String]) -> Result<Vec<PostRecord>, PostLookupError>;
}

/// Post service client over HTTP.
///
/// Holds one pooled `reqwest::Client`, shared by every request.
pub struct HttpPostLookupClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPostLookupClient {
    /// Builds the client and checks the service is reachable.
    ///
    /// Failing here is meant to abort startup.
    pub async fn connect(base_url: &str, timeout_sec: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_sec))
            .build()
            .context("Failed to create HTTP client")?;

        let lookup = Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        };
        lookup.health_check().await?;
        info!("Connected to post service at {}", lookup.base_url);
        Ok(lookup)
    }

    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to connect to post service at {}", self.base_url))?;

        if response.status().is_success() {
            Ok(())
        } else {
            anyhow::bail!(
                "Post service health check failed with status: {}",
                response.status()
            )
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl PostLookup for HttpPostLookupClient {
    async fn fetch(&self, ids: &[String]) -> Result<Vec<PostRecord>, PostLookupError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/posts/lookup", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&LookupRequest { ids: ids.to_vec() })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PostLookupError::Status(response.status()));
        }

        let body: LookupResponse = response.json().await?;
        debug!(
            "Post service resolved {} of {} ids",
            body.posts.len(),
            ids.len()
        );
        Ok(body.posts)
    }
}
