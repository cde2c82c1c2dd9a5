use std::sync::Arc;

use super::{
    OidcError, ProviderRegistry, ReturnUrlPolicy,
    state::{AuthState, StateCodec},
};
use crate::db::DbPool;

/// Builds the provider redirect that starts a sign-in.
#[derive(Clone)]
pub struct AuthorizationInitiator {
    db: Arc<DbPool>,
    registry: Arc<ProviderRegistry>,
    return_urls: ReturnUrlPolicy,
}

impl AuthorizationInitiator {
    pub fn new(
        db: Arc<DbPool>,
        registry: Arc<ProviderRegistry>,
        return_urls: ReturnUrlPolicy,
    ) -> Self {
        Self {
            db,
            registry,
            return_urls,
        }
    }

    /// Authorization URL for the provider with `slug`.
    ///
    /// An unknown or disabled slug is not found. A provider that is enabled
    /// but has no live registry entry (discovery failed) is unavailable.
    /// The return URL is checked only once the provider resolves.
    pub async fn initiate(
        &self,
        slug: &str,
        return_url: Option<String>,
    ) -> Result<String, OidcError> {
        let config = self
            .db
            .providers()
            .get_by_slug(slug)
            .await?
            .filter(|p| p.enabled)
            .ok_or_else(|| OidcError::ProviderNotFound(slug.to_string()))?;

        let provider = self
            .registry
            .get(config.id)
            .await
            .ok_or_else(|| OidcError::ProviderUnavailable(slug.to_string()))?;

        let return_url = return_url.filter(|url| !url.is_empty());
        if let Some(url) = &return_url {
            self.return_urls.check(url)?;
        }

        let state = AuthState::new(config.id, return_url);
        let encoded = StateCodec::encode(&state)
            .map_err(|e| OidcError::Internal(format!("Failed to encode state: {}", e)))?;

        let url = provider.authorization_url(&encoded, &state.nonce)?;
        tracing::debug!(provider = %slug, "Built OIDC authorization URL");
        Ok(url)
    }
}
