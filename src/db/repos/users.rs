use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{IdentityLink, ProvisionUser, User, Workspace},
};

/// Repository for local accounts.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<User>>;

    /// Case-insensitive email lookup.
    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>>;

    /// Activate or deactivate an account.
    async fn set_active(&self, id: Uuid, active: bool) -> DbResult<User>;

    /// Create an account, its identity link and a personal workspace with the
    /// account as admin member, in one transaction.
    ///
    /// # Errors
    /// Returns `DbError::Conflict` if the email or the `(provider, subject)`
    /// pair is already taken; nothing is written in that case.
    async fn provision(&self, input: ProvisionUser) -> DbResult<(User, IdentityLink, Workspace)>;
}
