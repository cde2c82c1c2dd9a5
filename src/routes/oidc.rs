//! Public sign-in endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    auth::{CallbackOutcome, CallbackParams, OidcError},
    models::PublicOidcProvider,
};

#[derive(Debug, Default, Deserialize)]
pub struct AuthUrlRequest {
    /// Where to send the browser after sign-in. Without it the callback
    /// answers with JSON.
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

/// Providers that can currently be used to sign in.
#[tracing::instrument(name = "oidc.providers.list", skip(state))]
pub async fn list_providers(State(state): State<AppState>) -> Json<Vec<PublicOidcProvider>> {
    let providers = state
        .registry
        .list()
        .await
        .iter()
        .map(|p| PublicOidcProvider::from(p.config()))
        .collect();
    Json(providers)
}

/// Authorization URL for the provider with the given slug.
#[tracing::instrument(name = "oidc.authorize", skip(state, body))]
pub async fn authorize(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    body: Option<Json<AuthUrlRequest>>,
) -> Result<Json<AuthUrlResponse>, OidcError> {
    let Json(request) = body.unwrap_or_default();
    let auth_url = state.initiator.initiate(&slug, request.return_url).await?;
    Ok(Json(AuthUrlResponse { auth_url }))
}

/// Provider redirect target.
///
/// Redirects (303) to the return URL with the session token appended, or
/// responds with the session as JSON when the flow carried no return URL.
#[tracing::instrument(name = "oidc.callback", skip_all)]
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Response, OidcError> {
    let response = match state.callback.process(params).await? {
        CallbackOutcome::Redirect(url) => Redirect::to(&url).into_response(),
        CallbackOutcome::Session(session) => Json(session).into_response(),
    };
    Ok(response)
}
