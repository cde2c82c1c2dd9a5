use async_trait::async_trait;
use uuid::Uuid;

use crate::{db::error::DbResult, models::WorkspaceMembership};

/// Repository for workspaces.
#[async_trait]
pub trait WorkspaceRepo: Send + Sync {
    /// Workspaces the user belongs to, oldest first.
    async fn list_for_user(&self, user_id: Uuid) -> DbResult<Vec<WorkspaceMembership>>;
}
