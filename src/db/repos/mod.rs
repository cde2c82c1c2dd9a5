mod identity_links;
mod oidc_providers;
mod users;
mod workspaces;

pub use identity_links::*;
pub use oidc_providers::*;
pub use users::*;
pub use workspaces::*;
