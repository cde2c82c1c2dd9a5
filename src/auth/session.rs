//! Session credential issuance.
//!
//! Once a sign-in resolves to an active account, a [`SessionIssuer`] mints the
//! application's own credential. The default implementation signs an HS256 JWT.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::{MAX_SESSION_TTL_SECS, SessionConfig},
    models::User,
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to sign session token: {0}")]
    Signing(String),

    #[error("Invalid session token: {0}")]
    InvalidToken(String),
}

/// A minted credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints a credential for a resolved account.
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn issue(&self, user: &User) -> Result<IssuedSession, SessionError>;
}

/// Claims of a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,
    pub email: String,
    pub name: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256-signed JWT sessions.
pub struct JwtSessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtSessionIssuer {
    pub fn new(config: &SessionConfig) -> Self {
        let secret = config.secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            ttl: Duration::seconds(config.ttl_secs.min(MAX_SESSION_TTL_SECS) as i64),
        }
    }

    /// Decode and validate a token minted by this issuer.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| SessionError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl SessionIssuer for JwtSessionIssuer {
    async fn issue(&self, user: &User) -> Result<IssuedSession, SessionError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = SessionClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            name: user.display_name.clone(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| SessionError::Signing(e.to_string()))?;

        Ok(IssuedSession { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn config(secret: &str) -> SessionConfig {
        toml::from_str(&format!("secret = \"{secret}\"\nttl_secs = 600")).unwrap()
    }

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: "ann@example.com".into(),
            display_name: "Ann".into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_issue_and_verify() {
        let issuer = JwtSessionIssuer::new(&config("0123456789abcdef0123456789abcdef"));
        let user = user();

        let session = issuer.issue(&user).await.unwrap();
        let claims = issuer.verify(&session.token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "ann@example.com");
        assert_eq!(claims.name, "Ann");
        assert_eq!(claims.iss, "tether");
        assert_eq!(claims.exp, session.expires_at.timestamp());
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[tokio::test]
    async fn test_token_from_other_secret_rejected() {
        let ours = JwtSessionIssuer::new(&config("0123456789abcdef0123456789abcdef"));
        let theirs = JwtSessionIssuer::new(&config("ffffffffffffffffffffffffffffffff"));

        let session = theirs.issue(&user()).await.unwrap();
        assert!(matches!(
            ours.verify(&session.token),
            Err(SessionError::InvalidToken(_))
        ));
    }
}
