pub mod admin;
pub mod health;
pub mod oidc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::AppState;

/// Public sign-in routes, mounted under `/oidc`.
pub fn oidc_routes() -> Router<AppState> {
    Router::new()
        .route("/providers", get(oidc::list_providers))
        .route("/providers/{slug}/auth", post(oidc::authorize))
        .route("/callback", get(oidc::callback))
}
