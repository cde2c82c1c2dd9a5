//! Admin CRUD for OIDC provider configurations.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use axum_valid::Valid;
use uuid::Uuid;

use super::error::AdminError;
use crate::{
    AppState,
    models::{CreateOidcProvider, UpdateOidcProvider},
    services::ManagedProvider,
};

/// List all configured providers, including disabled ones and secrets.
#[tracing::instrument(name = "admin.oidc_providers.list", skip(state))]
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ManagedProvider>>, AdminError> {
    let providers = state.services.providers.list().await?;
    Ok(Json(providers))
}

#[tracing::instrument(name = "admin.oidc_providers.get", skip(state))]
pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ManagedProvider>, AdminError> {
    let provider = state.services.providers.get(id).await?;
    Ok(Json(provider))
}

/// Create a provider and try to activate it.
///
/// A provider whose discovery fails is still created; the response carries
/// `active: false` and the `activation_error`.
#[tracing::instrument(name = "admin.oidc_providers.create", skip_all)]
pub async fn create(
    State(state): State<AppState>,
    Valid(Json(input)): Valid<Json<CreateOidcProvider>>,
) -> Result<(StatusCode, Json<ManagedProvider>), AdminError> {
    let provider = state.services.providers.create(input).await?;
    Ok((StatusCode::CREATED, Json(provider)))
}

/// Partially update a provider and reinitialize its runtime entry.
#[tracing::instrument(name = "admin.oidc_providers.update", skip(state, input))]
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Valid(Json(input)): Valid<Json<UpdateOidcProvider>>,
) -> Result<Json<ManagedProvider>, AdminError> {
    let provider = state.services.providers.update(id, input).await?;
    Ok(Json(provider))
}

/// Delete a provider together with its identity links.
#[tracing::instrument(name = "admin.oidc_providers.delete", skip(state))]
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    state.services.providers.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
