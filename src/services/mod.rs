mod identity;
mod providers;

use std::sync::Arc;

pub use identity::{
    IdentityClaims, IdentityResolver, ResolutionOutcome, ResolveError, ResolvedIdentity,
    display_name,
};
pub use providers::{ManagedProvider, OidcProviderService, ProviderServiceError};

use crate::{auth::ProviderRegistry, db::DbPool};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub identity: IdentityResolver,
    pub providers: OidcProviderService,
}

impl Services {
    pub fn new(db: Arc<DbPool>, registry: Arc<ProviderRegistry>) -> Self {
        Self {
            identity: IdentityResolver::new(Arc::clone(&db)),
            providers: OidcProviderService::new(db, registry),
        }
    }
}
