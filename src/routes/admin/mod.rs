mod error;
pub mod providers;

use axum::{
    Router,
    routing::get,
};
pub use error::AdminError;

use crate::AppState;

/// Admin routes, mounted under `/admin`.
/// The API-key middleware is applied in `build_app` where state is available.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/oidc/providers",
            get(providers::list).post(providers::create),
        )
        .route(
            "/oidc/providers/{id}",
            get(providers::get)
                .put(providers::update)
                .delete(providers::delete),
        )
}
