mod common;
mod identity_links;
mod oidc_providers;
mod users;
mod workspaces;

pub use identity_links::SqliteIdentityLinkRepo;
pub use oidc_providers::SqliteOidcProviderRepo;
pub use users::SqliteUserRepo;
pub use workspaces::SqliteWorkspaceRepo;
