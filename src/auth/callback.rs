//! Completion of the authorization code flow.
//!
//! One callback runs these steps in order and stops at the first failure:
//! decode state, resolve provider, check for a provider error, exchange the
//! code, extract and verify the ID token, check the nonce, read the claims,
//! resolve the account, reject inactive accounts, issue a session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use super::{
    OidcError, ProviderRegistry, ReturnUrlPolicy,
    session::SessionIssuer,
    state::StateCodec,
};
use crate::{
    models::UserSummary,
    services::{IdentityClaims, IdentityResolver, ResolveError},
};

/// Query parameters of the provider redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Credential and account summary returned when there is no return URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserSummary,
}

#[derive(Debug, Clone)]
pub enum CallbackOutcome {
    /// Redirect to the caller's return URL with the credential appended.
    Redirect(String),
    Session(SessionResponse),
}

/// Settings for [`CallbackProcessor`] taken from configuration.
#[derive(Debug, Clone)]
pub struct CallbackOptions {
    pub require_verified_email: bool,
    /// Query parameter carrying the credential on redirect.
    pub redirect_param: String,
}

#[derive(Clone)]
pub struct CallbackProcessor {
    registry: Arc<ProviderRegistry>,
    resolver: IdentityResolver,
    sessions: Arc<dyn SessionIssuer>,
    return_urls: ReturnUrlPolicy,
    options: CallbackOptions,
}

impl CallbackProcessor {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        resolver: IdentityResolver,
        sessions: Arc<dyn SessionIssuer>,
        return_urls: ReturnUrlPolicy,
        options: CallbackOptions,
    ) -> Self {
        Self {
            registry,
            resolver,
            sessions,
            return_urls,
            options,
        }
    }

    pub async fn process(&self, params: CallbackParams) -> Result<CallbackOutcome, OidcError> {
        let encoded = params
            .state
            .as_deref()
            .ok_or_else(|| OidcError::InvalidState("missing state parameter".into()))?;
        let state =
            StateCodec::decode(encoded).map_err(|e| OidcError::InvalidState(e.to_string()))?;

        let provider = self
            .registry
            .get(state.provider_id)
            .await
            .ok_or(OidcError::UnknownProvider)?;
        let slug = provider.slug();

        if let Some(error) = params.error {
            tracing::warn!(
                provider = %slug,
                error = %error,
                description = params.error_description.as_deref().unwrap_or(""),
                "OIDC provider returned an authorization error"
            );
            return Err(OidcError::ProviderDenied {
                error,
                description: params.error_description,
            });
        }

        let code = params
            .code
            .filter(|c| !c.is_empty())
            .ok_or(OidcError::MissingCode)?;

        if let Some(url) = &state.return_url {
            self.return_urls.check(url)?;
        }

        let tokens = provider.exchange_code(&code).await?;

        let id_token = tokens.id_token.ok_or_else(|| {
            tracing::error!(provider = %slug, "No ID token in token response");
            OidcError::MissingIdToken
        })?;

        let claims = provider.verify_id_token(&id_token).await?;

        let nonce_matches = claims
            .nonce
            .as_deref()
            .is_some_and(|nonce| bool::from(nonce.as_bytes().ct_eq(state.nonce.as_bytes())));
        if !nonce_matches {
            tracing::warn!(
                provider = %slug,
                "OIDC nonce mismatch: possible token replay or forged state"
            );
            return Err(OidcError::NonceMismatch);
        }

        let email = claims
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(OidcError::MissingEmail)?
            .to_string();

        tracing::debug!(
            provider = %slug,
            email_verified = ?claims.email_verified,
            "ID token verified"
        );
        if self.options.require_verified_email && claims.email_verified != Some(true) {
            return Err(OidcError::EmailNotVerified);
        }

        let identity = IdentityClaims {
            subject: claims.sub,
            email,
            name: claims.name,
            given_name: claims.given_name,
            family_name: claims.family_name,
        };

        let resolved = self
            .resolver
            .resolve(provider.config(), &identity)
            .await
            .map_err(|e| match e {
                ResolveError::NotEligible => OidcError::NotEligible,
                ResolveError::Database(e) => OidcError::Database(e),
            })?;
        let user = resolved.user;

        if !user.is_active {
            tracing::warn!(user_id = %user.id, provider = %slug, "Rejected sign-in for inactive account");
            return Err(OidcError::AccountInactive);
        }

        let session = self
            .sessions
            .issue(&user)
            .await
            .map_err(|e| OidcError::Session(e.to_string()))?;

        tracing::info!(
            user_id = %user.id,
            provider = %slug,
            outcome = ?resolved.outcome,
            "OIDC sign-in completed"
        );

        Ok(match state.return_url {
            Some(url) => CallbackOutcome::Redirect(append_query_param(
                &url,
                &self.options.redirect_param,
                &session.token,
            )),
            None => CallbackOutcome::Session(SessionResponse {
                token: session.token,
                expires_at: session.expires_at,
                user: UserSummary::from(&user),
            }),
        })
    }
}

/// Append `name=value` to a URL's query, keeping any fragment last. Works for
/// absolute and relative URLs.
fn append_query_param(url: &str, name: &str, value: &str) -> String {
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };

    let pair = form_urlencoded::Serializer::new(String::new())
        .append_pair(name, value)
        .finish();

    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };

    let mut out = format!("{base}{separator}{pair}");
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}
