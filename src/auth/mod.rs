mod callback;
pub mod discovery;
mod error;
mod initiator;
pub mod jwt;
mod provider;
mod registry;
mod return_url;
pub mod session;
pub mod state;
#[cfg(test)]
pub(crate) mod testing;

pub use callback::{
    CallbackOptions, CallbackOutcome, CallbackParams, CallbackProcessor, SessionResponse,
};
pub use error::OidcError;
pub use initiator::AuthorizationInitiator;
pub use provider::RuntimeProvider;
pub use registry::{LoadSummary, ProviderRegistry, RegistryError};
pub use return_url::ReturnUrlPolicy;
pub use session::{IssuedSession, JwtSessionIssuer, SessionError, SessionIssuer};
