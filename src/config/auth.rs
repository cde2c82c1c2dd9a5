use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Minimum session signing secret length in bytes (HS256 key size).
const MIN_SESSION_SECRET_LEN: usize = 32;

/// Upper bound on `auth.session.ttl_secs` (one year).
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 3600;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// OpenID Connect relying-party settings shared by all providers.
    pub oidc: OidcConfig,

    /// Session credential minted after a successful sign-in.
    pub session: SessionConfig,

    /// Admin API authentication. When omitted, admin routes are open and the
    /// server must bind to loopback.
    #[serde(default)]
    pub admin: Option<AdminAuthConfig>,
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.oidc.validate()?;
        self.session.validate()?;
        if let Some(admin) = &self.admin
            && admin.api_key.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "auth.admin.api_key cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Relying-party configuration for the OIDC flow.
///
/// Provider credentials (issuer, client id, secret) live in the database and
/// are managed through the admin API; this section only holds settings common
/// to every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OidcConfig {
    /// Public URL of `GET /oidc/callback`, registered with every provider.
    pub redirect_uri: String,

    /// Upper bound on provider discovery during load and admin changes.
    #[serde(default = "default_discovery_timeout")]
    pub discovery_timeout_secs: u64,

    /// Timeout for outbound calls to the token and JWKS endpoints.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// How long a fetched JWKS is trusted before it is refetched.
    #[serde(default = "default_jwks_refresh")]
    pub jwks_refresh_secs: u64,

    /// Clock skew tolerated when checking `exp`.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,

    /// ID token signing algorithms accepted from providers.
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<JwtAlgorithm>,

    /// Origins (`scheme://host[:port]`) that `return_url` may point at.
    /// Empty means return URLs are not checked.
    #[serde(default)]
    pub allowed_return_origins: Vec<String>,

    /// Reject ID tokens whose `email_verified` claim is not `true`.
    #[serde(default)]
    pub require_verified_email: bool,
}

impl OidcConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.redirect_uri).map_err(|e| {
            ConfigError::Validation(format!(
                "auth.oidc.redirect_uri '{}' is not a valid URL: {}",
                self.redirect_uri, e
            ))
        })?;

        if self.discovery_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "auth.oidc.discovery_timeout_secs must be greater than zero".into(),
            ));
        }

        if self.allowed_algorithms.is_empty() {
            return Err(ConfigError::Validation(
                "auth.oidc.allowed_algorithms cannot be empty".into(),
            ));
        }

        for origin in &self.allowed_return_origins {
            let parsed = url::Url::parse(origin).map_err(|e| {
                ConfigError::Validation(format!(
                    "auth.oidc.allowed_return_origins entry '{}' is not a valid URL: {}",
                    origin, e
                ))
            })?;
            if !parsed.origin().is_tuple() {
                return Err(ConfigError::Validation(format!(
                    "auth.oidc.allowed_return_origins entry '{}' has no host",
                    origin
                )));
            }
        }

        Ok(())
    }
}

/// Session credential configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// HMAC secret used to sign session tokens.
    pub secret: String,

    /// `iss` claim of minted session tokens.
    #[serde(default = "default_session_issuer")]
    pub issuer: String,

    /// Session lifetime in seconds.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Query parameter carrying the credential when redirecting to `return_url`.
    #[serde(default = "default_redirect_param")]
    pub redirect_param: String,
}

impl SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Validation(format!(
                "auth.session.secret must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            )));
        }
        if self.ttl_secs == 0 || self.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::Validation(format!(
                "auth.session.ttl_secs must be between 1 and {}",
                MAX_SESSION_TTL_SECS
            )));
        }
        if self.redirect_param.is_empty() {
            return Err(ConfigError::Validation(
                "auth.session.redirect_param cannot be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Admin API key authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminAuthConfig {
    /// Key expected in `Authorization: Bearer` or `X-API-Key`.
    pub api_key: String,
}

/// JWT signing algorithm.
/// SECURITY: Asymmetric algorithms (RS*, ES*) are strongly recommended.
/// HMAC algorithms (HS*) are verified with the provider's client secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JwtAlgorithm {
    HS256,
    HS384,
    HS512,
    RS256,
    RS384,
    RS512,
    ES256,
    ES384,
    PS256,
    PS384,
    PS512,
    EdDSA,
}

impl JwtAlgorithm {
    /// Convert to jsonwebtoken Algorithm.
    pub fn to_jwt_algorithm(self) -> jsonwebtoken::Algorithm {
        match self {
            JwtAlgorithm::HS256 => jsonwebtoken::Algorithm::HS256,
            JwtAlgorithm::HS384 => jsonwebtoken::Algorithm::HS384,
            JwtAlgorithm::HS512 => jsonwebtoken::Algorithm::HS512,
            JwtAlgorithm::RS256 => jsonwebtoken::Algorithm::RS256,
            JwtAlgorithm::RS384 => jsonwebtoken::Algorithm::RS384,
            JwtAlgorithm::RS512 => jsonwebtoken::Algorithm::RS512,
            JwtAlgorithm::ES256 => jsonwebtoken::Algorithm::ES256,
            JwtAlgorithm::ES384 => jsonwebtoken::Algorithm::ES384,
            JwtAlgorithm::PS256 => jsonwebtoken::Algorithm::PS256,
            JwtAlgorithm::PS384 => jsonwebtoken::Algorithm::PS384,
            JwtAlgorithm::PS512 => jsonwebtoken::Algorithm::PS512,
            JwtAlgorithm::EdDSA => jsonwebtoken::Algorithm::EdDSA,
        }
    }

    /// Check if this algorithm matches a jsonwebtoken Algorithm.
    pub fn matches(self, alg: jsonwebtoken::Algorithm) -> bool {
        self.to_jwt_algorithm() == alg
    }
}

fn default_allowed_algorithms() -> Vec<JwtAlgorithm> {
    vec![
        JwtAlgorithm::RS256,
        JwtAlgorithm::RS384,
        JwtAlgorithm::RS512,
        JwtAlgorithm::ES256,
        JwtAlgorithm::ES384,
    ]
}

fn default_discovery_timeout() -> u64 {
    5
}

fn default_http_timeout() -> u64 {
    10
}

fn default_jwks_refresh() -> u64 {
    3600 // 1 hour
}

fn default_leeway() -> u64 {
    60
}

fn default_session_issuer() -> String {
    "tether".to_string()
}

fn default_session_ttl() -> u64 {
    86400 // 24 hours
}

fn default_redirect_param() -> String {
    "token".to_string()
}
