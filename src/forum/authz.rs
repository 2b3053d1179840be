//! Ownership and admin checks for destructive forum operations.

use tracing::{error, info, warn};

use super::error::ForumError;
use crate::gateway::IdentityGateway;
use crate::rpc::RpcCode;

/// Allow a delete when the caller wrote the resource or is an admin.
///
/// `author` is the result of looking up the resource's author: a lookup
/// failure is internal and a missing resource is `NotFound(resource)`.
pub async fn authorize_delete<E: std::fmt::Display>(
    gateway: &IdentityGateway,
    resource: &'static str,
    author: Result<Option<i64>, E>,
    caller_id: i64,
) -> Result<(), ForumError> {
    let author_id = author
        .map_err(|e| {
            error!("Failed to get {} author: {}", resource, e);
            ForumError::Internal(format!("unable to get {} author", resource))
        })?
        .ok_or(ForumError::NotFound(resource))?;

    if author_id == caller_id {
        return Ok(());
    }

    let is_admin = gateway.is_admin(caller_id).await.map_err(|e| {
        if e.code == RpcCode::DeadlineExceeded {
            return ForumError::DeadlineExceeded;
        }
        error!(user_id = caller_id, "Admin check failed: {}", e);
        ForumError::Internal("admin check failed".into())
    })?;

    if is_admin {
        info!(user_id = caller_id, author_id, "Admin deleting another user's {}", resource);
        Ok(())
    } else {
        warn!(user_id = caller_id, author_id, "Delete of another user's {} denied", resource);
        Err(ForumError::NotAuthorized)
    }
}
