use super::pagination::Pagination;
use super::requests::PostsRequest;
use crate::auth::{
    allow_any, authorize, owner_only, Principal, Resource, ATTACH_POSTS, CREATE_BOOKMARK,
    DELETE_BOOKMARK, DETACH_POSTS,
};
use crate::bookmark::{Bookmark, BookmarkStore, PostRef, Projection};
use crate::post_service::PostLookup;
use crate::server::metrics::{record_enrichment_failure, record_operation};
use crate::status::{OperationError, OperationResult, OperationStatus, Outcome};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Orchestrates the store, the post service and the authorization guard.
///
/// Dropping any returned future abandons the operation; nothing is retried.
pub struct BookmarkManager {
    store: Arc<dyn BookmarkStore>,
    posts: Arc<dyn PostLookup>,
}

fn observed<T>(operation: &str, result: OperationResult<T>) -> OperationResult<T> {
    let status = match &result {
        Ok(outcome) => outcome.status,
        Err(err) => err.status,
    };
    record_operation(operation, status);
    result
}

fn not_exist_for_invalid_id(raw: &str) -> OperationError {
    OperationError::new(
        OperationStatus::NotExist,
        format!("'{}' is not a valid bookmark id", raw),
    )
}

impl BookmarkManager {
    pub fn new(store: Arc<dyn BookmarkStore>, posts: Arc<dyn PostLookup>) -> Self {
        Self { store, posts }
    }

    pub async fn fetch(
        &self,
        pagination: &Pagination,
        projection: &Projection,
    ) -> OperationResult<Vec<Bookmark>> {
        let result = match self
            .store
            .fetch(projection, pagination.limit(), pagination.skip())
        {
            Ok(mut outcome) => {
                self.enrich(&mut outcome.value).await;
                Ok(outcome)
            }
            Err(err) => Err(err),
        };
        observed("fetch", result)
    }

    pub async fn fetch_by_id(&self, id: &str, projection: &Projection) -> OperationResult<Bookmark> {
        let bookmark_id = self.store.id_from_string(id);
        let result = if bookmark_id.is_nil() {
            Err(not_exist_for_invalid_id(id))
        } else {
            match self.store.fetch_by_id(&bookmark_id, projection) {
                Ok(mut outcome) => {
                    self.enrich(std::slice::from_mut(&mut outcome.value)).await;
                    Ok(outcome)
                }
                Err(err) => Err(err),
            }
        };
        observed("fetch_by_id", result)
    }

    pub async fn fetch_by_owner(
        &self,
        owner_id: &str,
        projection: &Projection,
    ) -> OperationResult<Bookmark> {
        let result = match self.store.fetch_by_owner(owner_id, projection) {
            Ok(mut outcome) => {
                self.enrich(std::slice::from_mut(&mut outcome.value)).await;
                Ok(outcome)
            }
            Err(err) => Err(err),
        };
        observed("fetch_by_owner", result)
    }

    /// Creates the principal's bookmark. The payload must name the principal as owner.
    pub async fn create(
        &self,
        principal: &Principal,
        request: &PostsRequest,
    ) -> OperationResult<Bookmark> {
        observed("create", self.create_bookmark(principal, request))
    }

    /// Attaches posts to the bookmark of `owner_id`, creating it on first use.
    pub async fn add_post(
        &self,
        principal: &Principal,
        request: &PostsRequest,
        owner_id: &str,
    ) -> OperationResult<()> {
        observed("add_post", self.attach_posts(principal, request, owner_id))
    }

    /// Detaches posts from the bookmark of `owner_id`.
    ///
    /// A failed owner lookup reports `PostRevokeFailed`, a failed detach `DeletePostFailed`.
    pub async fn revoke_post(
        &self,
        principal: &Principal,
        request: &PostsRequest,
        owner_id: &str,
    ) -> OperationResult<()> {
        let result = match self.store.fetch_by_owner(owner_id, &Projection::all()) {
            Ok(found) => self
                .guard_owner_mutation(principal, &DETACH_POSTS, request, owner_id, &found.value)
                .and_then(|_| self.store.revoke_posts(owner_id, &request.post_ids())),
            Err(err) if err.status == OperationStatus::NotExist => Err(err),
            Err(err) => Err(err.with_status(OperationStatus::PostRevokeFailed)),
        };
        observed("revoke_post", result)
    }

    /// Hard-deletes a bookmark. Only its owner may do so.
    pub async fn delete(&self, principal: &Principal, id: &str) -> OperationResult<()> {
        observed("delete", self.delete_bookmark(principal, id))
    }

    fn create_bookmark(
        &self,
        principal: &Principal,
        request: &PostsRequest,
    ) -> OperationResult<Bookmark> {
        authorize(principal, &CREATE_BOOKMARK, None, allow_any)?;

        if !principal.is(&request.owner_id) {
            return Err(OperationError::new(
                OperationStatus::Forbidden,
                "user id doesn't match the authenticated user",
            ));
        }

        let now = Utc::now();
        let mut bookmark = Bookmark {
            id: self.store.new_id(),
            owner_id: principal.owner_id.clone(),
            posts: Some(request.post_ids().into_iter().map(PostRef::new).collect()),
            created_at: Some(now),
            updated_at: Some(now),
            deleted_at: None,
        };

        let created = self.store.create(&bookmark)?;
        bookmark.id = created.value;
        info!("Created bookmark {} for {}", bookmark.id, bookmark.owner_id);
        Ok(Outcome::new(bookmark, created.status))
    }

    fn attach_posts(
        &self,
        principal: &Principal,
        request: &PostsRequest,
        owner_id: &str,
    ) -> OperationResult<()> {
        match self.store.fetch_by_owner(owner_id, &Projection::all()) {
            Ok(found) => self.attach_to_existing(principal, request, owner_id, &found.value),
            Err(err) if err.status == OperationStatus::NotExist => {
                self.provision_with_posts(principal, request, owner_id)
            }
            Err(err) => Err(err.with_status(OperationStatus::PostFailed)),
        }
    }

    fn provision_with_posts(
        &self,
        principal: &Principal,
        request: &PostsRequest,
        owner_id: &str,
    ) -> OperationResult<()> {
        if !principal.is(owner_id) {
            return Err(OperationError::new(
                OperationStatus::Forbidden,
                "cannot create a bookmark for another user",
            ));
        }

        match self.create_bookmark(principal, request) {
            Ok(_) => {
                debug!("Attached {} posts to new bookmark of {}", request.posts.len(), owner_id);
                Ok(Outcome::status(OperationStatus::PostSuccess))
            }
            Err(err) if err.status == OperationStatus::Duplicate => {
                debug!("Bookmark of {} appeared concurrently, attaching to it", owner_id);
                let found = self
                    .store
                    .fetch_by_owner(owner_id, &Projection::all())
                    .map_err(|e| e.with_status(OperationStatus::PostFailed))?;
                self.attach_to_existing(principal, request, owner_id, &found.value)
            }
            Err(err)
                if matches!(
                    err.status,
                    OperationStatus::Unauthorized | OperationStatus::Forbidden
                ) =>
            {
                Err(err)
            }
            Err(err) => Err(err.with_status(OperationStatus::PostFailed)),
        }
    }

    fn attach_to_existing(
        &self,
        principal: &Principal,
        request: &PostsRequest,
        owner_id: &str,
        bookmark: &Bookmark,
    ) -> OperationResult<()> {
        self.guard_owner_mutation(principal, &ATTACH_POSTS, request, owner_id, bookmark)?;
        self.store.add_posts(owner_id, &request.post_ids())
    }

    /// Owner-only authorization, plus the payload and path owners must both be the principal.
    fn guard_owner_mutation(
        &self,
        principal: &Principal,
        resource: &Resource,
        request: &PostsRequest,
        owner_id: &str,
        bookmark: &Bookmark,
    ) -> Result<(), OperationError> {
        authorize(principal, resource, Some(&bookmark.owner_id), owner_only)?;
        if !principal.is(&request.owner_id) || !principal.is(owner_id) {
            return Err(OperationError::new(
                OperationStatus::Forbidden,
                "user id doesn't match the authenticated user",
            ));
        }
        Ok(())
    }

    fn delete_bookmark(&self, principal: &Principal, id: &str) -> OperationResult<()> {
        let bookmark_id = self.store.id_from_string(id);
        if bookmark_id.is_nil() {
            return Err(not_exist_for_invalid_id(id));
        }

        let found = self
            .store
            .fetch_by_id(&bookmark_id, &Projection::excluding(["posts"]))
            .map_err(|err| match err.status {
                OperationStatus::NotExist => err,
                _ => err.with_status(OperationStatus::DeleteFailed),
            })?;
        authorize(
            principal,
            &DELETE_BOOKMARK,
            Some(&found.value.owner_id),
            owner_only,
        )?;

        let deleted = self.store.delete(&bookmark_id)?;
        info!("Deleted bookmark {} of {}", bookmark_id, found.value.owner_id);
        Ok(deleted)
    }

    /// Fills post names from the post service. Never removes or adds posts; on failure or
    /// an empty answer the bookmarks are left as stored.
    async fn enrich(&self, bookmarks: &mut [Bookmark]) {
        let mut ids: Vec<String> = Vec::new();
        for id in bookmarks.iter().flat_map(|bookmark| bookmark.post_ids()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let records = match self.posts.fetch(&ids).await {
            Ok(records) => records,
            Err(err) => {
                warn!("Post enrichment failed, serving stored posts: {}", err);
                record_enrichment_failure();
                return;
            }
        };
        if records.is_empty() {
            if !ids.is_empty() {
                debug!("Post service knew none of {} posts", ids.len());
            }
            return;
        }

        let names: HashMap<&str, &str> = records
            .iter()
            .map(|record| (record.id.as_str(), record.name.as_str()))
            .collect();
        for post in bookmarks
            .iter_mut()
            .filter_map(|bookmark| bookmark.posts.as_mut())
            .flatten()
        {
            if let Some(name) = names.get(post.id.as_str()) {
                post.name = Some(name.to_string());
            }
        }
    }
}
