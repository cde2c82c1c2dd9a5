use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateIdentityLink, IdentityLink},
};

/// Repository for links between provider subjects and local accounts.
#[async_trait]
pub trait IdentityLinkRepo: Send + Sync {
    /// Look up the link for a provider's subject.
    async fn get_by_subject(
        &self,
        provider_id: Uuid,
        subject: &str,
    ) -> DbResult<Option<IdentityLink>>;

    /// Create a link.
    ///
    /// # Errors
    /// Returns `DbError::Conflict` if `(provider_id, subject)` is already linked.
    async fn create(&self, input: CreateIdentityLink) -> DbResult<IdentityLink>;

    async fn list_by_user(&self, user_id: Uuid) -> DbResult<Vec<IdentityLink>>;
}
