mod identity_link;
mod provider;
mod user;
mod validators;
mod workspace;

pub use identity_link::*;
pub use provider::*;
pub use user::*;
pub use validators::*;
pub use workspace::*;
