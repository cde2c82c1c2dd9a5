//! Federated OpenID Connect sign-in for the link-management service.
//!
//! Administrators register identity providers at runtime. End users pick one,
//! authenticate there, and come back through the callback, which verifies the
//! ID token, resolves the local account (linking or provisioning as needed)
//! and issues a session credential.

pub mod api_types;
pub mod auth;
pub mod config;
pub mod db;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;

#[cfg(test)]
mod tests;

use std::{sync::Arc, time::Duration};

use axum::{Router, routing::get};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    auth::{
        AuthorizationInitiator, CallbackOptions, CallbackProcessor, JwtSessionIssuer,
        ProviderRegistry, RegistryError, ReturnUrlPolicy, SessionIssuer,
    },
    config::TetherConfig,
    db::DbPool,
    services::Services,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TetherConfig>,
    pub db: Arc<DbPool>,
    /// Live runtime entries for enabled providers.
    pub registry: Arc<ProviderRegistry>,
    pub services: Services,
    pub initiator: AuthorizationInitiator,
    pub callback: CallbackProcessor,
}

impl AppState {
    /// Build the state with an empty provider registry.
    ///
    /// Call [`ProviderRegistry::load`] on `state.registry` afterwards to
    /// initialize the stored providers.
    pub fn new(config: TetherConfig, db: DbPool) -> Result<Self, RegistryError> {
        let registry = ProviderRegistry::new(config.auth.oidc.clone())?;
        let sessions: Arc<dyn SessionIssuer> =
            Arc::new(JwtSessionIssuer::new(&config.auth.session));
        Ok(Self::from_parts(
            Arc::new(config),
            Arc::new(db),
            Arc::new(registry),
            sessions,
        ))
    }

    /// Assemble the state from already constructed parts.
    pub fn from_parts(
        config: Arc<TetherConfig>,
        db: Arc<DbPool>,
        registry: Arc<ProviderRegistry>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Self {
        let services = Services::new(Arc::clone(&db), Arc::clone(&registry));
        let return_urls = ReturnUrlPolicy::new(&config.auth.oidc.allowed_return_origins);

        let initiator = AuthorizationInitiator::new(
            Arc::clone(&db),
            Arc::clone(&registry),
            return_urls.clone(),
        );
        let callback = CallbackProcessor::new(
            Arc::clone(&registry),
            services.identity.clone(),
            sessions,
            return_urls,
            CallbackOptions {
                require_verified_email: config.auth.oidc.require_verified_email,
                redirect_param: config.auth.session.redirect_param.clone(),
            },
        );

        Self {
            config,
            db,
            registry,
            services,
            initiator,
            callback,
        }
    }
}

pub fn build_app(config: &TetherConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .route("/health/ready", get(routes::health::readiness))
        .nest("/oidc", routes::oidc_routes());

    if config.auth.admin.is_some() {
        app = app.nest(
            "/admin",
            routes::admin::admin_routes().route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::admin_auth_middleware,
            )),
        );
    } else {
        tracing::warn!(
            "Admin routes are UNPROTECTED: no admin API key configured. \
             Set [auth.admin] api_key before exposing this service."
        );
        app = app.nest("/admin", routes::admin::admin_routes());
    }

    app.layer(TimeoutLayer::new(Duration::from_secs(
        config.server.request_timeout_secs,
    )))
    .layer(TraceLayer::new_for_http())
    .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
    .with_state(state)
}
