use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::ProviderRegistry,
    db::{DbError, DbPool},
    models::{CreateOidcProvider, OidcProvider, UpdateOidcProvider},
};

#[derive(Debug, thiserror::Error)]
pub enum ProviderServiceError {
    #[error("OIDC provider not found")]
    NotFound,

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for ProviderServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound => ProviderServiceError::NotFound,
            DbError::Conflict(msg) => ProviderServiceError::Conflict(msg),
            other => ProviderServiceError::Database(other),
        }
    }
}

/// A stored provider together with its registry status.
#[derive(Debug, Clone, Serialize)]
pub struct ManagedProvider {
    #[serde(flatten)]
    pub provider: OidcProvider,
    /// Whether a live runtime entry exists for this provider
    pub active: bool,
    /// Why initialization failed, when the provider was saved but not activated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_error: Option<String>,
}

/// Admin management of OIDC providers.
///
/// Every write is persisted first and then synchronized into the registry.
/// A discovery failure does not fail the write; it is reported through
/// `activation_error`.
#[derive(Clone)]
pub struct OidcProviderService {
    db: Arc<DbPool>,
    registry: Arc<ProviderRegistry>,
}

impl OidcProviderService {
    pub fn new(db: Arc<DbPool>, registry: Arc<ProviderRegistry>) -> Self {
        Self { db, registry }
    }

    pub async fn list(&self) -> Result<Vec<ManagedProvider>, ProviderServiceError> {
        let providers = self.db.providers().list().await?;
        let mut managed = Vec::with_capacity(providers.len());
        for provider in providers {
            let active = self.registry.contains(provider.id).await;
            managed.push(ManagedProvider {
                provider,
                active,
                activation_error: None,
            });
        }
        Ok(managed)
    }

    pub async fn get(&self, id: Uuid) -> Result<ManagedProvider, ProviderServiceError> {
        let provider = self
            .db
            .providers()
            .get_by_id(id)
            .await?
            .ok_or(ProviderServiceError::NotFound)?;
        let active = self.registry.contains(id).await;
        Ok(ManagedProvider {
            provider,
            active,
            activation_error: None,
        })
    }

    pub async fn create(
        &self,
        input: CreateOidcProvider,
    ) -> Result<ManagedProvider, ProviderServiceError> {
        let provider = self.db.providers().create(input).await?;
        tracing::info!(provider_id = %provider.id, slug = %provider.slug, "OIDC provider created");
        Ok(self.activate(provider).await)
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateOidcProvider,
    ) -> Result<ManagedProvider, ProviderServiceError> {
        let provider = self.db.providers().update(id, input).await?;
        tracing::info!(provider_id = %provider.id, slug = %provider.slug, "OIDC provider updated");
        Ok(self.activate(provider).await)
    }

    /// Delete a provider and its identity links, and drop its registry entry.
    pub async fn delete(&self, id: Uuid) -> Result<(), ProviderServiceError> {
        self.db.providers().delete(id).await?;
        self.registry.remove(id).await;
        tracing::info!(provider_id = %id, "OIDC provider deleted");
        Ok(())
    }

    async fn activate(&self, provider: OidcProvider) -> ManagedProvider {
        match self.registry.upsert(provider.clone()).await {
            Ok(runtime) => ManagedProvider {
                active: runtime.is_some(),
                provider,
                activation_error: None,
            },
            Err(e) => {
                tracing::warn!(
                    provider_id = %provider.id,
                    slug = %provider.slug,
                    error = %e,
                    "OIDC provider saved but not activated"
                );
                ManagedProvider {
                    provider,
                    active: false,
                    activation_error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use wiremock::MockServer;

    use super::*;
    use crate::{
        auth::testing::mount_identity_provider,
        config::OidcConfig,
        db::tests::harness::{create_sqlite_pool, run_sqlite_migrations},
        models::CreateIdentityLink,
    };

    async fn service() -> (Arc<DbPool>, Arc<ProviderRegistry>, OidcProviderService) {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        let db = Arc::new(DbPool::from_sqlite(pool));
        let oidc: OidcConfig =
            toml::from_str(r#"redirect_uri = "https://links.example.com/oidc/callback""#).unwrap();
        let registry = Arc::new(ProviderRegistry::new(oidc).unwrap());
        let service = OidcProviderService::new(Arc::clone(&db), Arc::clone(&registry));
        (db, registry, service)
    }

    fn input(slug: &str, issuer: &str) -> CreateOidcProvider {
        CreateOidcProvider {
            name: slug.into(),
            slug: slug.into(),
            issuer: issuer.into(),
            client_id: "links-app".into(),
            client_secret: "s3cret".into(),
            scopes: vec!["openid".into()],
            enabled: true,
            auto_provision: false,
        }
    }

    #[tokio::test]
    async fn test_create_activates_provider() {
        let server = MockServer::start().await;
        mount_identity_provider(&server).await;
        let (_, registry, service) = service().await;

        let managed = service.create(input("acme", &server.uri())).await.unwrap();

        assert!(managed.active);
        assert!(managed.activation_error.is_none());
        assert!(registry.contains(managed.provider.id).await);
    }

    #[tokio::test]
    async fn test_saved_but_not_activated() {
        let (db, registry, service) = service().await;

        let managed = service
            .create(input("down", "http://127.0.0.1:9"))
            .await
            .unwrap();

        assert!(!managed.active);
        assert!(managed.activation_error.is_some());
        assert!(!registry.contains(managed.provider.id).await);
        assert!(db.providers().get_by_slug("down").await.unwrap().is_some());

        let json = serde_json::to_value(&managed).unwrap();
        assert_eq!(json["slug"], "down");
        assert_eq!(json["active"], false);
        assert!(json["activation_error"].is_string());
    }

    #[tokio::test]
    async fn test_disable_then_enable() {
        let server = MockServer::start().await;
        mount_identity_provider(&server).await;
        let (_, registry, service) = service().await;
        let id = service
            .create(input("acme", &server.uri()))
            .await
            .unwrap()
            .provider
            .id;

        let disabled = service
            .update(
                id,
                UpdateOidcProvider {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!disabled.active);
        assert!(disabled.activation_error.is_none());
        assert!(!registry.contains(id).await);

        let enabled = service
            .update(
                id,
                UpdateOidcProvider {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(enabled.active);
    }

    #[tokio::test]
    async fn test_delete_removes_links_and_entry() {
        let server = MockServer::start().await;
        mount_identity_provider(&server).await;
        let (db, registry, service) = service().await;
        let google = service
            .create(input("google", &server.uri()))
            .await
            .unwrap()
            .provider;
        let other = service
            .create(input("other", &server.uri()))
            .await
            .unwrap()
            .provider;

        let (user, _, _) = db
            .users()
            .provision(crate::models::ProvisionUser {
                email: "ann@x.com".into(),
                display_name: "Ann".into(),
                provider_id: google.id,
                subject: "sub-1".into(),
                workspace_name: "Ann's workspace".into(),
            })
            .await
            .unwrap();
        db.identity_links()
            .create(CreateIdentityLink {
                user_id: user.id,
                provider_id: other.id,
                subject: "other-sub".into(),
                email: "ann@x.com".into(),
            })
            .await
            .unwrap();

        service.delete(google.id).await.unwrap();

        assert!(!registry.contains(google.id).await);
        let links = db.identity_links().list_by_user(user.id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].provider_id, other.id);

        assert!(matches!(
            service.delete(google.id).await,
            Err(ProviderServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_slug_conflicts() {
        let (_, _, service) = service().await;
        service
            .create(input("dup", "http://127.0.0.1:9"))
            .await
            .unwrap();

        assert!(matches!(
            service.create(input("dup", "http://127.0.0.1:9")).await,
            Err(ProviderServiceError::Conflict(_))
        ));
    }
}
