use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::validators::{SLUG_REGEX, validate_scopes};

/// An OpenID Connect identity provider.
///
/// Created and edited only through the admin API. The runtime client built
/// from it lives in the provider registry and is rebuilt whenever this row
/// changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OidcProvider {
    pub id: Uuid,
    /// Display name shown on the sign-in page (e.g., "Google")
    pub name: String,
    /// URL-safe identifier used in `/oidc/providers/{slug}/auth`
    pub slug: String,
    /// Issuer URL; discovery is fetched from `{issuer}/.well-known/openid-configuration`
    pub issuer: String,
    pub client_id: String,
    pub client_secret: String,
    /// OAuth2 scopes requested during authorization
    pub scopes: Vec<String>,
    pub enabled: bool,
    /// Create a local account on first sign-in when no account matches the email
    pub auto_provision: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a provider for the sign-in page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicOidcProvider {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub enabled: bool,
}

impl From<&OidcProvider> for PublicOidcProvider {
    fn from(provider: &OidcProvider) -> Self {
        Self {
            id: provider.id,
            name: provider.name.clone(),
            slug: provider.slug.clone(),
            enabled: provider.enabled,
        }
    }
}

/// Request to create a provider.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOidcProvider {
    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(min = 1, max = 64), regex(path = *SLUG_REGEX))]
    pub slug: String,

    #[validate(length(max = 512), url)]
    pub issuer: String,

    #[validate(length(min = 1, max = 256))]
    pub client_id: String,

    #[validate(length(min = 1, max = 1024))]
    pub client_secret: String,

    /// OAuth2 scopes to request (defaults to ["openid", "email", "profile"])
    #[serde(default = "default_scopes")]
    #[validate(custom(function = "validate_scopes"))]
    pub scopes: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub auto_provision: bool,
}

/// Partial update of a provider. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOidcProvider {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 64), regex(path = *SLUG_REGEX))]
    pub slug: Option<String>,

    #[validate(length(max = 512), url)]
    pub issuer: Option<String>,

    #[validate(length(min = 1, max = 256))]
    pub client_id: Option<String>,

    #[validate(length(min = 1, max = 1024))]
    pub client_secret: Option<String>,

    #[validate(custom(function = "validate_scopes"))]
    pub scopes: Option<Vec<String>>,

    pub enabled: Option<bool>,

    pub auto_provision: Option<bool>,
}

fn default_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "email".to_string(),
        "profile".to_string(),
    ]
}

fn default_true() -> bool {
    true
}
