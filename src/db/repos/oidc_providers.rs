use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    db::error::DbResult,
    models::{CreateOidcProvider, OidcProvider, UpdateOidcProvider},
};

/// Repository for OpenID Connect provider configurations.
#[async_trait]
pub trait OidcProviderRepo: Send + Sync {
    /// Create a provider.
    ///
    /// # Errors
    /// Returns `DbError::Conflict` if the slug is already taken.
    async fn create(&self, input: CreateOidcProvider) -> DbResult<OidcProvider>;

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<OidcProvider>>;

    async fn get_by_slug(&self, slug: &str) -> DbResult<Option<OidcProvider>>;

    /// All providers, ordered by name.
    async fn list(&self) -> DbResult<Vec<OidcProvider>>;

    /// Enabled providers only, ordered by name.
    async fn list_enabled(&self) -> DbResult<Vec<OidcProvider>>;

    /// Apply a partial update. Fields left as `None` keep their current value.
    ///
    /// # Errors
    /// `DbError::NotFound` for an unknown id, `DbError::Conflict` on a slug clash.
    async fn update(&self, id: Uuid, input: UpdateOidcProvider) -> DbResult<OidcProvider>;

    /// Delete a provider together with every identity link created through it.
    async fn delete(&self, id: Uuid) -> DbResult<()>;
}
