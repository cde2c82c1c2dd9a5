//! Live, ready-to-use state for one identity provider.

use std::time::Duration;

use reqwest::Url;

use super::{
    OidcError,
    discovery::{OidcDiscovery, TokenResponse, fetch_discovery},
    jwt::{IdTokenClaims, IdTokenVerifier, VerifierConfig},
};
use crate::{config::OidcConfig, models::OidcProvider};

/// A provider built from its stored configuration: discovery metadata, an
/// OAuth2 client bound to its credentials, and an ID token verifier.
///
/// Immutable once built. A config change builds a new one.
pub struct RuntimeProvider {
    config: OidcProvider,
    discovery: OidcDiscovery,
    verifier: IdTokenVerifier,
    http_client: reqwest::Client,
    redirect_uri: String,
    scope: String,
}

impl std::fmt::Debug for RuntimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeProvider")
            .field("id", &self.config.id)
            .field("slug", &self.config.slug)
            .field("issuer", &self.discovery.issuer)
            .finish_non_exhaustive()
    }
}

impl RuntimeProvider {
    /// Fetch discovery and build the provider. Performs network I/O.
    pub async fn initialize(
        config: OidcProvider,
        oidc: &OidcConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, OidcError> {
        let discovery = fetch_discovery(&http_client, &config.issuer).await?;

        Url::parse(&discovery.authorization_endpoint).map_err(|e| {
            OidcError::Discovery(format!("Invalid authorization endpoint URL: {}", e))
        })?;

        let verifier = IdTokenVerifier::new(
            VerifierConfig {
                issuer: discovery.issuer.clone(),
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                jwks_uri: discovery.jwks_uri.clone(),
                allowed_algorithms: oidc.allowed_algorithms.clone(),
                jwks_refresh: Duration::from_secs(oidc.jwks_refresh_secs),
                leeway_secs: oidc.leeway_secs,
            },
            http_client.clone(),
        );

        let scope = request_scope(&config.scopes);

        Ok(Self {
            config,
            discovery,
            verifier,
            http_client,
            redirect_uri: oidc.redirect_uri.clone(),
            scope,
        })
    }

    pub fn config(&self) -> &OidcProvider {
        &self.config
    }

    pub fn id(&self) -> uuid::Uuid {
        self.config.id
    }

    pub fn slug(&self) -> &str {
        &self.config.slug
    }

    pub fn discovery(&self) -> &OidcDiscovery {
        &self.discovery
    }

    /// Build the authorization endpoint URL for one round trip.
    pub fn authorization_url(&self, state: &str, nonce: &str) -> Result<String, OidcError> {
        let mut url = Url::parse(&self.discovery.authorization_endpoint).map_err(|e| {
            OidcError::Internal(format!("Invalid authorization endpoint URL: {}", e))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("response_type", "code");
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.redirect_uri);
            query.append_pair("scope", &self.scope);
            query.append_pair("state", state);
            query.append_pair("nonce", nonce);
        }

        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, OidcError> {
        let token_response = self
            .http_client
            .post(&self.discovery.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &self.redirect_uri),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, provider = %self.config.slug, "Failed to exchange code for tokens");
                OidcError::CodeExchange(e.to_string())
            })?;

        if !token_response.status().is_success() {
            let status = token_response.status();
            let body = token_response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                provider = %self.config.slug,
                "Token endpoint returned error"
            );
            return Err(OidcError::CodeExchange(format!(
                "token endpoint returned {}",
                status
            )));
        }

        token_response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse token response");
            OidcError::CodeExchange(format!("Failed to parse token response: {}", e))
        })
    }

    pub async fn verify_id_token(&self, id_token: &str) -> Result<IdTokenClaims, OidcError> {
        self.verifier.verify(id_token).await
    }
}

/// Space-joined scopes with `openid` first.
fn request_scope(scopes: &[String]) -> String {
    let mut scopes: Vec<&str> = scopes
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if !scopes.contains(&"openid") {
        scopes.insert(0, "openid");
    }
    scopes.join(" ")
}

#[cfg(test)]
mod tests {
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_string_contains, method, path},
    };

    use super::*;
    use crate::auth::testing::{TEST_CLIENT_ID, mount_identity_provider, provider_config};

    fn oidc_config() -> OidcConfig {
        toml::from_str(r#"redirect_uri = "https://links.example.com/oidc/callback""#).unwrap()
    }

    #[test]
    fn test_request_scope() {
        let scopes = |s: &[&str]| request_scope(&s.iter().map(|s| s.to_string()).collect::<Vec<_>>());

        assert_eq!(scopes(&["email", "profile"]), "openid email profile");
        assert_eq!(scopes(&["email", "openid"]), "email openid");
        assert_eq!(scopes(&[]), "openid");
    }

    #[tokio::test]
    async fn test_authorization_url() {
        let server = MockServer::start().await;
        mount_identity_provider(&server).await;

        let mut config = provider_config(&server.uri(), "acme");
        config.scopes = vec!["email".into()];
        let provider = RuntimeProvider::initialize(
            config,
            &oidc_config(),
            reqwest::Client::new(),
        )
        .await
        .unwrap();

        let url = Url::parse(&provider.authorization_url("st&te", "n0nce").unwrap()).unwrap();
        assert_eq!(url.path(), "/authorize");

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], TEST_CLIENT_ID);
        assert_eq!(params["redirect_uri"], "https://links.example.com/oidc/callback");
        assert_eq!(params["scope"], "openid email");
        assert_eq!(params["state"], "st&te");
        assert_eq!(params["nonce"], "n0nce");
    }

    #[tokio::test]
    async fn test_initialize_unreachable_issuer() {
        let result = RuntimeProvider::initialize(
            provider_config("http://127.0.0.1:9", "down"),
            &oidc_config(),
            reqwest::Client::new(),
        )
        .await;

        assert!(matches!(result, Err(OidcError::Discovery(_))));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_client_credentials() {
        let server = MockServer::start().await;
        mount_identity_provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_secret=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "id_token": "header.payload.sig",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = RuntimeProvider::initialize(
            provider_config(&server.uri(), "acme"),
            &oidc_config(),
            reqwest::Client::new(),
        )
        .await
        .unwrap();

        let tokens = provider.exchange_code("the-code").await.unwrap();
        assert_eq!(tokens.id_token.as_deref(), Some("header.payload.sig"));
    }

    #[tokio::test]
    async fn test_exchange_code_error_status() {
        let server = MockServer::start().await;
        mount_identity_provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "invalid_grant"})),
            )
            .mount(&server)
            .await;

        let provider = RuntimeProvider::initialize(
            provider_config(&server.uri(), "acme"),
            &oidc_config(),
            reqwest::Client::new(),
        )
        .await
        .unwrap();

        assert!(matches!(
            provider.exchange_code("stale").await,
            Err(OidcError::CodeExchange(msg)) if msg.contains("400")
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_ignores_extra_fields_and_requires_access_token() {
        let server = MockServer::start().await;
        mount_identity_provider(&server).await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=full"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "at",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "rt",
                "scope": "openid email",
                "id_token": "header.payload.sig",
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=bare"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id_token": "header.payload.sig",
            })))
            .mount(&server)
            .await;

        let provider = RuntimeProvider::initialize(
            provider_config(&server.uri(), "acme"),
            &oidc_config(),
            reqwest::Client::new(),
        )
        .await
        .unwrap();

        let tokens = provider.exchange_code("full").await.unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.id_token.as_deref(), Some("header.payload.sig"));

        assert!(matches!(
            provider.exchange_code("bare").await,
            Err(OidcError::CodeExchange(msg)) if msg.contains("parse")
        ));
    }
}
