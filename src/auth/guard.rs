//! Permission and ownership checks run before any bookmark mutation.

use super::permissions::{Permission, Principal};
use crate::status::{OperationError, OperationStatus};
use tracing::debug;

/// A protected operation and the permission it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resource {
    pub permission: Permission,
    pub name: &'static str,
}

pub const CREATE_BOOKMARK: Resource = Resource {
    permission: Permission::Create,
    name: "create bookmark",
};

pub const ATTACH_POSTS: Resource = Resource {
    permission: Permission::Update,
    name: "attach posts",
};

pub const DETACH_POSTS: Resource = Resource {
    permission: Permission::Update,
    name: "detach posts",
};

pub const DELETE_BOOKMARK: Resource = Resource {
    permission: Permission::Delete,
    name: "delete bookmark",
};

/// Checks `principal` may use `resource`, then lets `decide` rule on ownership.
///
/// `subject_owner` is the owner of the targeted bookmark, `None` when there is no bookmark
/// yet. The guard knows nothing about business rules; `decide` receives whether the
/// principal owns the subject and returns the final status.
pub fn authorize<F>(
    principal: &Principal,
    resource: &Resource,
    subject_owner: Option<&str>,
    decide: F,
) -> Result<OperationStatus, OperationError>
where
    F: FnOnce(bool) -> Result<OperationStatus, OperationError>,
{
    if !principal.has_permission(resource.permission) {
        debug!(
            "{} lacks permission '{}' for {}",
            principal.owner_id,
            resource.permission.alias(),
            resource.name
        );
        return Err(OperationError::new(
            OperationStatus::Unauthorized,
            format!(
                "user {} doesn't have permission to {}",
                principal.owner_id, resource.name
            ),
        ));
    }

    let is_owner = subject_owner.is_some_and(|owner| principal.is(owner));
    decide(is_owner)
}

/// Decision for operations that only need the permission.
pub fn allow_any(_is_owner: bool) -> Result<OperationStatus, OperationError> {
    Ok(OperationStatus::Authorized)
}

/// Decision for operations reserved to the bookmark's owner.
pub fn owner_only(is_owner: bool) -> Result<OperationStatus, OperationError> {
    if is_owner {
        Ok(OperationStatus::Authorized)
    } else {
        Err(OperationError::new(
            OperationStatus::Forbidden,
            "you are not the owner",
        ))
    }
}
