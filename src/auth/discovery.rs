//! OIDC discovery document fetch.

use serde::Deserialize;

use super::OidcError;

const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// OIDC discovery document.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcDiscovery {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    pub jwks_uri: String,
    #[serde(default)]
    pub scopes_supported: Vec<String>,
    #[serde(default)]
    pub response_types_supported: Vec<String>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
    #[serde(default)]
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// Token response from the provider's token endpoint.
///
/// Only the ID token is consumed; `access_token` is required so a malformed
/// success body fails as a code exchange error. Other fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// URL of the discovery document for an issuer.
pub fn discovery_url(issuer: &str) -> String {
    format!("{}{}", issuer.trim_end_matches('/'), WELL_KNOWN_PATH)
}

/// Compare issuers, ignoring a trailing slash.
pub fn issuers_match(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Fetch and validate the discovery document for `issuer`.
///
/// The document's `issuer` must match the configured one; a mismatch means the
/// tokens it signs would never verify.
pub async fn fetch_discovery(
    http_client: &reqwest::Client,
    issuer: &str,
) -> Result<OidcDiscovery, OidcError> {
    let url = discovery_url(issuer);

    tracing::debug!(url = %url, "Fetching OIDC discovery document");

    let response = http_client.get(&url).send().await.map_err(|e| {
        tracing::debug!(error = %e, url = %url, "Failed to fetch OIDC discovery");
        OidcError::Discovery(format!("Failed to fetch OIDC discovery: {}", e))
    })?;

    if !response.status().is_success() {
        let status = response.status();
        tracing::debug!(status = %status, url = %url, "OIDC discovery endpoint returned error");
        return Err(OidcError::Discovery(format!(
            "OIDC discovery returned {}",
            status
        )));
    }

    let discovery: OidcDiscovery = response
        .json()
        .await
        .map_err(|e| OidcError::Discovery(format!("Failed to parse OIDC discovery: {}", e)))?;

    if !issuers_match(&discovery.issuer, issuer) {
        return Err(OidcError::Discovery(format!(
            "Discovery issuer '{}' does not match configured issuer '{}'",
            discovery.issuer, issuer
        )));
    }

    Ok(discovery)
}
