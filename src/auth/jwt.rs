//! ID token verification with JWKS support.
//!
//! Each runtime provider owns one verifier bound to its issuer and client id.
//! Keys are fetched lazily from the provider's `jwks_uri`, cached, and
//! refetched when the cache expires or a token names an unknown key id.

use std::{
    str::FromStr,
    time::{Duration, Instant},
};

use jsonwebtoken::{
    Algorithm, DecodingKey, TokenData, Validation, decode, decode_header,
    jwk::{AlgorithmParameters, Jwk, JwkSet, PublicKeyUse},
};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;

use super::OidcError;
use crate::config::JwtAlgorithm;

/// Minimum interval between JWKS fetches triggered by an unknown `kid`.
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// Standard claims read from a verified ID token. Unknown claims are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Subject (provider's stable user identifier)
    pub sub: String,

    /// Issuer
    pub iss: String,

    /// Audience (can be string or array)
    #[serde(default)]
    pub aud: Audience,

    /// Expiration time (Unix timestamp)
    pub exp: u64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,

    #[serde(default)]
    pub nonce: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    /// Some providers send this as the string "true"/"false".
    #[serde(default, deserialize_with = "deserialize_lenient_bool")]
    pub email_verified: Option<bool>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub given_name: Option<String>,

    #[serde(default)]
    pub family_name: Option<String>,
}

/// Audience can be a single string or an array of strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    #[default]
    None,
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, aud: &str) -> bool {
        match self {
            Audience::None => false,
            Audience::Single(s) => s == aud,
            Audience::Multiple(v) => v.iter().any(|s| s == aud),
        }
    }
}

fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    Ok(
        match Option::<BoolOrString>::deserialize(deserializer)? {
            Some(BoolOrString::Bool(b)) => Some(b),
            Some(BoolOrString::String(s)) if s.eq_ignore_ascii_case("true") => Some(true),
            Some(BoolOrString::String(s)) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        },
    )
}

/// Settings a verifier is bound to.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Issuer from the provider's discovery document.
    pub issuer: String,
    pub client_id: String,
    /// Key for HS* tokens.
    pub client_secret: String,
    pub jwks_uri: String,
    pub allowed_algorithms: Vec<JwtAlgorithm>,
    pub jwks_refresh: Duration,
    pub leeway_secs: u64,
}

/// One usable key from the provider's JWKS.
struct CachedKey {
    kid: Option<String>,
    /// The JWK's `alg`, when it names a signing algorithm.
    alg: Option<Algorithm>,
    family: KeyFamily,
    /// Marked `"use": "enc"`; never picked for a token without a key id.
    encryption: bool,
    key: DecodingKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyFamily {
    Rsa,
    Ec,
    Okp,
}

impl KeyFamily {
    fn signs(self, alg: Algorithm) -> bool {
        match self {
            KeyFamily::Rsa => matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            ),
            KeyFamily::Ec => matches!(alg, Algorithm::ES256 | Algorithm::ES384),
            KeyFamily::Okp => alg == Algorithm::EdDSA,
        }
    }
}

enum KeyLookup {
    Found(DecodingKey),
    Missing,
    /// More than one key could verify a token that names no key id.
    Ambiguous(usize),
}

/// Cached JWKS with expiration.
struct CachedJwks {
    keys: Vec<CachedKey>,
    fetched_at: Instant,
}

impl CachedJwks {
    /// Pick the key for a token. With a `kid` the match is exact; without one
    /// the single key able to verify `alg` is used.
    fn select(&self, kid: Option<&str>, alg: Algorithm) -> KeyLookup {
        if let Some(kid) = kid {
            return self
                .keys
                .iter()
                .find(|k| k.kid.as_deref() == Some(kid))
                .map_or(KeyLookup::Missing, |k| KeyLookup::Found(k.key.clone()));
        }

        let mut candidates = self
            .keys
            .iter()
            .filter(|k| !k.encryption && k.family.signs(alg) && k.alg.is_none_or(|a| a == alg));
        match (candidates.next(), candidates.count()) {
            (None, _) => KeyLookup::Missing,
            (Some(k), 0) => KeyLookup::Found(k.key.clone()),
            (Some(_), rest) => KeyLookup::Ambiguous(rest + 1),
        }
    }
}

/// ID token verifier that fetches and caches the provider's JWKS.
pub struct IdTokenVerifier {
    config: VerifierConfig,
    http_client: reqwest::Client,
    jwks_cache: RwLock<Option<CachedJwks>>,
}

impl IdTokenVerifier {
    pub fn new(config: VerifierConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
            jwks_cache: RwLock::new(None),
        }
    }

    /// Verify signature, issuer, audience and expiry; return the claims.
    ///
    /// The nonce is not checked here, only by the caller that knows the
    /// expected value.
    pub async fn verify(&self, token: &str) -> Result<IdTokenClaims, OidcError> {
        let header = decode_header(token)
            .map_err(|e| OidcError::TokenVerification(format!("malformed header: {}", e)))?;

        // SECURITY: reject algorithms outside the allowlist before touching
        // keys, which rules out "none" and HS/RS key confusion.
        if !self.is_algorithm_allowed(header.alg) {
            tracing::warn!(
                algorithm = ?header.alg,
                allowed = ?self.allowed_algorithms(),
                "ID token algorithm not in allowlist"
            );
            return Err(OidcError::TokenVerification(format!(
                "algorithm {:?} is not allowed",
                header.alg
            )));
        }

        let decoding_key = match header.alg {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                DecodingKey::from_secret(self.config.client_secret.as_bytes())
            }
            alg => self.get_decoding_key(header.kid.as_deref(), alg).await?,
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_audience(&[&self.config.client_id]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = self.config.leeway_secs;

        let token_data: TokenData<IdTokenClaims> = decode(token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "ID token validation failed");
                OidcError::TokenVerification(e.to_string())
            })?;

        Ok(token_data.claims)
    }

    /// Check if an algorithm is in the allowlist.
    fn is_algorithm_allowed(&self, alg: Algorithm) -> bool {
        self.config
            .allowed_algorithms
            .iter()
            .any(|allowed| allowed.matches(alg))
    }

    /// Get the list of allowed algorithms (for logging).
    fn allowed_algorithms(&self) -> Vec<Algorithm> {
        self.config
            .allowed_algorithms
            .iter()
            .map(|a| a.to_jwt_algorithm())
            .collect()
    }

    /// Get the decoding key for a token, fetching JWKS if necessary.
    ///
    /// Tokens without a `kid` fall back to the only cached key that can
    /// verify `alg`; several candidates is an error.
    async fn get_decoding_key(
        &self,
        kid: Option<&str>,
        alg: Algorithm,
    ) -> Result<DecodingKey, OidcError> {
        {
            let cache = self.jwks_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < self.config.jwks_refresh {
                    match cached.select(kid, alg) {
                        KeyLookup::Found(key) => return Ok(key),
                        KeyLookup::Ambiguous(count) => return Err(ambiguous_key(count, alg)),
                        // Missing key on a fresh cache: allow a refetch for
                        // key rotation, but not on every request.
                        KeyLookup::Missing if age < MIN_REFRESH_INTERVAL => {
                            return Err(missing_key(kid, alg));
                        }
                        KeyLookup::Missing => {}
                    }
                }
            }
        }

        self.refresh_jwks().await?;

        let cache = self.jwks_cache.read().await;
        match cache.as_ref().map(|c| c.select(kid, alg)) {
            Some(KeyLookup::Found(key)) => Ok(key),
            Some(KeyLookup::Ambiguous(count)) => Err(ambiguous_key(count, alg)),
            Some(KeyLookup::Missing) | None => Err(missing_key(kid, alg)),
        }
    }

    /// Fetch and cache the JWKS.
    async fn refresh_jwks(&self) -> Result<(), OidcError> {
        tracing::debug!(url = %self.config.jwks_uri, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.config.jwks_uri)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, url = %self.config.jwks_uri, "Failed to fetch JWKS");
                OidcError::TokenVerification(format!("failed to fetch JWKS: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(status = %status, url = %self.config.jwks_uri, "JWKS endpoint returned error");
            return Err(OidcError::TokenVerification(format!(
                "JWKS endpoint returned {}",
                status
            )));
        }

        let jwks: JwkSet = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to parse JWKS response");
            OidcError::TokenVerification(format!("failed to parse JWKS: {}", e))
        })?;

        let mut keys = Vec::with_capacity(jwks.keys.len());
        for jwk in jwks.keys {
            let Some(family) = key_family(&jwk) else {
                continue;
            };
            match jwk_to_decoding_key(&jwk) {
                Ok(key) => keys.push(CachedKey {
                    alg: jwk
                        .common
                        .key_algorithm
                        .and_then(|a| Algorithm::from_str(&format!("{a:?}")).ok()),
                    encryption: jwk.common.public_key_use == Some(PublicKeyUse::Encryption),
                    kid: jwk.common.key_id,
                    family,
                    key,
                }),
                Err(e) => {
                    tracing::warn!(kid = ?jwk.common.key_id, error = %e, "Failed to convert JWK to decoding key");
                }
            }
        }

        tracing::debug!(keys_count = keys.len(), url = %self.config.jwks_uri, "JWKS refreshed");

        let mut cache = self.jwks_cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }
}

fn missing_key(kid: Option<&str>, alg: Algorithm) -> OidcError {
    match kid {
        Some(kid) => {
            tracing::warn!(kid = kid, "Key ID not found in JWKS");
            OidcError::TokenVerification(format!("unknown key id '{}'", kid))
        }
        None => {
            tracing::warn!(algorithm = ?alg, "No JWKS key for token without key id");
            OidcError::TokenVerification(format!("no JWKS key matches algorithm {:?}", alg))
        }
    }
}

fn ambiguous_key(count: usize, alg: Algorithm) -> OidcError {
    tracing::warn!(candidates = count, algorithm = ?alg, "Token without key id matches several JWKS keys");
    OidcError::TokenVerification(format!(
        "token has no key id and {} JWKS keys match algorithm {:?}",
        count, alg
    ))
}

/// Signing key family of a JWK; `None` for symmetric or unsupported keys.
fn key_family(jwk: &Jwk) -> Option<KeyFamily> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(_) => Some(KeyFamily::Rsa),
        AlgorithmParameters::EllipticCurve(_) => Some(KeyFamily::Ec),
        AlgorithmParameters::OctetKeyPair(_) => Some(KeyFamily::Okp),
        _ => None,
    }
}

/// Convert a JWK to a DecodingKey.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, OidcError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| OidcError::Internal(format!("Failed to create RSA decoding key: {}", e))),
        AlgorithmParameters::EllipticCurve(ec) => {
            use jsonwebtoken::jwk::KeyAlgorithm;

            match jwk.common.key_algorithm {
                // None defaults to ES256
                Some(KeyAlgorithm::ES256) | Some(KeyAlgorithm::ES384) | None => {
                    DecodingKey::from_ec_components(&ec.x, &ec.y).map_err(|e| {
                        OidcError::Internal(format!("Failed to create EC decoding key: {}", e))
                    })
                }
                Some(alg) => Err(OidcError::Internal(format!(
                    "Unsupported EC algorithm: {alg:?}"
                ))),
            }
        }
        AlgorithmParameters::OctetKeyPair(okp) => DecodingKey::from_ed_components(&okp.x)
            .map_err(|e| OidcError::Internal(format!("Failed to create EdDSA decoding key: {}", e))),
        _ => Err(OidcError::Internal(
            "Unsupported JWK algorithm type".to_string(),
        )),
    }
}
