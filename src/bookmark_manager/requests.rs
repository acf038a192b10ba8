use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostPayload {
    pub id: String,
}

/// Body of create, attach and detach requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PostsRequest {
    #[serde(alias = "user_id")]
    pub owner_id: String,
    pub posts: Vec<PostPayload>,
}

impl PostsRequest {
    pub fn new<I, S>(owner_id: impl Into<String>, post_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner_id: owner_id.into(),
            posts: post_ids
                .into_iter()
                .map(|id| PostPayload { id: id.into() })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.owner_id.trim().is_empty() {
            return Err("owner_id is required".to_string());
        }
        if let Some(index) = self.posts.iter().position(|post| post.id.trim().is_empty()) {
            return Err(format!("posts[{}].id is required", index));
        }
        Ok(())
    }

    /// Post ids in request order, repeated ids dropped.
    pub fn post_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::with_capacity(self.posts.len());
        for post in &self.posts {
            if !ids.contains(&post.id) {
                ids.push(post.id.clone());
            }
        }
        ids
    }
}
