//! Provider registry.
//!
//! Maps provider ids to their [`RuntimeProvider`]. Discovery runs outside the
//! lock; the write lock is held only to swap a map entry, so lookups never
//! wait on network I/O and never see a half-built provider.
//!
//! ```rust,ignore
//! let registry = ProviderRegistry::new(config.auth.oidc.clone())?;
//! registry.load(db.providers().as_ref()).await?;
//!
//! if let Some(provider) = registry.get(provider_id).await {
//!     let url = provider.authorization_url(&state, &nonce)?;
//! }
//! ```

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OidcError, provider::RuntimeProvider};
use crate::{
    config::OidcConfig,
    db::{DbError, OidcProviderRepo},
    models::OidcProvider,
};

/// Error type for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to initialize provider '{slug}': {source}")]
    Initialization {
        provider_id: Uuid,
        slug: String,
        #[source]
        source: OidcError,
    },

    #[error("Discovery for provider '{slug}' timed out after {timeout_secs}s")]
    Timeout { slug: String, timeout_secs: u64 },

    #[error("Failed to load provider configs: {0}")]
    Load(#[from] DbError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Result of [`ProviderRegistry::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub failed: usize,
}

#[derive(Default)]
struct RegistryState {
    providers: HashMap<Uuid, Arc<RuntimeProvider>>,
    /// `updated_at` of the config each entry (or its absence) was derived
    /// from. An install never goes backwards.
    versions: HashMap<Uuid, DateTime<Utc>>,
}

/// Registry of live OIDC providers.
pub struct ProviderRegistry {
    state: RwLock<RegistryState>,
    oidc: OidcConfig,
    http_client: reqwest::Client,
}

impl ProviderRegistry {
    /// Create an empty registry. Outbound calls are bounded by
    /// `http_timeout_secs`.
    pub fn new(oidc: OidcConfig) -> Result<Self, RegistryError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(oidc.http_timeout_secs))
            .build()
            .map_err(|e| RegistryError::HttpClient(e.to_string()))?;
        Ok(Self::with_client(oidc, http_client))
    }

    pub fn with_client(oidc: OidcConfig, http_client: reqwest::Client) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            oidc,
            http_client,
        }
    }

    /// Initialize every enabled provider concurrently.
    ///
    /// A provider that fails to initialize is logged and skipped; it never
    /// prevents the others from loading. Entries for providers that are no
    /// longer enabled are dropped, unless an `upsert` newer than the database
    /// snapshot installed them while discovery was running. Version records
    /// of providers deleted from the database are forgotten.
    pub async fn load(&self, repo: &dyn OidcProviderRepo) -> Result<LoadSummary, RegistryError> {
        let snapshot_at = Utc::now();
        let stored = repo.list().await?;
        let stored_ids: HashSet<Uuid> = stored.iter().map(|c| c.id).collect();
        let configs: Vec<OidcProvider> = stored.into_iter().filter(|c| c.enabled).collect();
        let enabled_ids: HashSet<Uuid> = configs.iter().map(|c| c.id).collect();

        let results = join_all(configs.into_iter().map(|config| async move {
            let id = config.id;
            let version = config.updated_at;
            (id, version, self.initialize(config).await)
        }))
        .await;

        let mut summary = LoadSummary::default();
        let mut built = Vec::with_capacity(results.len());
        for (id, version, result) in results {
            match result {
                Ok(provider) => {
                    summary.loaded += 1;
                    built.push((id, version, Some(Arc::new(provider))));
                }
                Err(e) => {
                    summary.failed += 1;
                    let slug = match &e {
                        RegistryError::Initialization { slug, .. }
                        | RegistryError::Timeout { slug, .. } => slug.as_str(),
                        _ => "",
                    };
                    tracing::warn!(
                        provider_id = %id,
                        slug = %slug,
                        error = %e,
                        "Failed to initialize OIDC provider, skipping"
                    );
                    built.push((id, version, None));
                }
            }
        }

        {
            let mut state = self.state.write().await;
            state.prune(&enabled_ids, &stored_ids, snapshot_at);
            for (id, version, provider) in built {
                state.install(id, version, provider);
            }
        }

        tracing::info!(
            loaded = summary.loaded,
            failed = summary.failed,
            "OIDC provider registry loaded"
        );

        Ok(summary)
    }

    /// Rebuild the entry for a provider after its config changed.
    ///
    /// A disabled config removes the entry and returns `Ok(None)`. When
    /// initialization fails the previous entry is removed as well, so a
    /// client built from an outdated config does not keep serving.
    pub async fn upsert(
        &self,
        config: OidcProvider,
    ) -> Result<Option<Arc<RuntimeProvider>>, RegistryError> {
        let id = config.id;
        let version = config.updated_at;

        if !config.enabled {
            self.state.write().await.install(id, version, None);
            tracing::debug!(provider_id = %id, slug = %config.slug, "OIDC provider disabled, removed from registry");
            return Ok(None);
        }

        match self.initialize(config).await {
            Ok(provider) => {
                let provider = Arc::new(provider);
                let mut state = self.state.write().await;
                if state.install(id, version, Some(Arc::clone(&provider))) {
                    tracing::debug!(provider_id = %id, slug = %provider.slug(), "OIDC provider registered");
                    Ok(Some(provider))
                } else {
                    tracing::debug!(provider_id = %id, "Newer OIDC provider config already installed");
                    Ok(state.providers.get(&id).cloned())
                }
            }
            Err(e) => {
                self.state.write().await.install(id, version, None);
                Err(e)
            }
        }
    }

    /// Drop a deleted provider. Later installs for the same id are ignored.
    pub async fn remove(&self, id: Uuid) -> Option<Arc<RuntimeProvider>> {
        let mut state = self.state.write().await;
        state.versions.insert(id, DateTime::<Utc>::MAX_UTC);
        state.providers.remove(&id)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<RuntimeProvider>> {
        self.state.read().await.providers.get(&id).cloned()
    }

    pub async fn get_by_slug(&self, slug: &str) -> Option<Arc<RuntimeProvider>> {
        self.state
            .read()
            .await
            .providers
            .values()
            .find(|p| p.slug() == slug)
            .cloned()
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.state.read().await.providers.contains_key(&id)
    }

    /// Loaded providers, sorted by name.
    pub async fn list(&self) -> Vec<Arc<RuntimeProvider>> {
        let mut providers: Vec<_> = self.state.read().await.providers.values().cloned().collect();
        providers.sort_by(|a, b| a.config().name.cmp(&b.config().name));
        providers
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.providers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.providers.is_empty()
    }

    /// Build a runtime provider, bounded by the discovery timeout. No lock held.
    async fn initialize(&self, config: OidcProvider) -> Result<RuntimeProvider, RegistryError> {
        let provider_id = config.id;
        let slug = config.slug.clone();
        let timeout_secs = self.oidc.discovery_timeout_secs;

        let init = RuntimeProvider::initialize(config, &self.oidc, self.http_client.clone());
        match tokio::time::timeout(Duration::from_secs(timeout_secs), init).await {
            Ok(Ok(provider)) => Ok(provider),
            Ok(Err(source)) => Err(RegistryError::Initialization {
                provider_id,
                slug,
                source,
            }),
            Err(_) => Err(RegistryError::Timeout { slug, timeout_secs }),
        }
    }
}

impl RegistryState {
    /// Drop entries that are not in the enabled snapshot and forget versions
    /// of providers no longer stored. Anything installed from a config newer
    /// than `snapshot_at` was written after the snapshot and is kept.
    fn prune(
        &mut self,
        enabled_ids: &HashSet<Uuid>,
        stored_ids: &HashSet<Uuid>,
        snapshot_at: DateTime<Utc>,
    ) {
        let versions = &self.versions;
        let newer_than_snapshot = |id: &Uuid| {
            versions
                .get(id)
                .is_some_and(|v| *v > snapshot_at && *v != DateTime::<Utc>::MAX_UTC)
        };
        self.providers
            .retain(|id, _| enabled_ids.contains(id) || newer_than_snapshot(id));

        let kept: HashSet<Uuid> = self
            .versions
            .keys()
            .filter(|id| stored_ids.contains(id) || newer_than_snapshot(id))
            .copied()
            .collect();
        self.versions.retain(|id, _| kept.contains(id));
    }

    /// Install (or clear, when `provider` is `None`) the entry for `id` unless
    /// a newer config has already been installed. Returns whether it applied.
    fn install(
        &mut self,
        id: Uuid,
        version: DateTime<Utc>,
        provider: Option<Arc<RuntimeProvider>>,
    ) -> bool {
        if self.versions.get(&id).is_some_and(|current| *current > version) {
            return false;
        }
        self.versions.insert(id, version);
        match provider {
            Some(provider) => {
                self.providers.insert(id, provider);
            }
            None => {
                self.providers.remove(&id);
            }
        }
        true
    }
}
