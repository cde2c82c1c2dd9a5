use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{api_types::ErrorResponse, db::DbError};

/// Errors raised while initiating or completing an OIDC sign-in.
///
/// Client errors (4xx) carry enough detail for the caller to act on. Upstream
/// and internal errors are logged in full and returned with a generic message.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    #[error("Invalid state parameter: {0}")]
    InvalidState(String),

    #[error("State references a provider that is not loaded")]
    UnknownProvider,

    #[error("OIDC provider '{0}' not found")]
    ProviderNotFound(String),

    #[error("OIDC provider '{0}' is configured but not available")]
    ProviderUnavailable(String),

    #[error("Missing authorization code")]
    MissingCode,

    #[error("Provider returned error '{error}'")]
    ProviderDenied {
        error: String,
        description: Option<String>,
    },

    #[error("Return URL is not allowed: {0}")]
    ReturnUrlNotAllowed(String),

    #[error("Authorization code exchange failed: {0}")]
    CodeExchange(String),

    #[error("Token response did not include an ID token")]
    MissingIdToken,

    #[error("ID token verification failed: {0}")]
    TokenVerification(String),

    #[error("ID token nonce does not match the authorization request")]
    NonceMismatch,

    #[error("ID token does not contain an email address")]
    MissingEmail,

    #[error("Email address has not been verified by the provider")]
    EmailNotVerified,

    #[error("No account matches this identity and the provider does not provision accounts")]
    NotEligible,

    #[error("Account is deactivated")]
    AccountInactive,

    #[error("Provider discovery failed: {0}")]
    Discovery(String),

    #[error("Session issuance failed: {0}")]
    Session(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OidcError {
    pub fn status(&self) -> StatusCode {
        match self {
            OidcError::InvalidState(_)
            | OidcError::UnknownProvider
            | OidcError::MissingCode
            | OidcError::ProviderDenied { .. }
            | OidcError::ReturnUrlNotAllowed(_)
            | OidcError::NonceMismatch
            | OidcError::MissingEmail => StatusCode::BAD_REQUEST,
            OidcError::EmailNotVerified | OidcError::NotEligible | OidcError::AccountInactive => {
                StatusCode::FORBIDDEN
            }
            OidcError::ProviderNotFound(_) => StatusCode::NOT_FOUND,
            OidcError::ProviderUnavailable(_) | OidcError::Discovery(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            OidcError::CodeExchange(_)
            | OidcError::MissingIdToken
            | OidcError::TokenVerification(_)
            | OidcError::Session(_)
            | OidcError::Database(_)
            | OidcError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            OidcError::InvalidState(_) => "invalid_state",
            OidcError::UnknownProvider => "unknown_provider",
            OidcError::ProviderNotFound(_) => "provider_not_found",
            OidcError::ProviderUnavailable(_) => "provider_unavailable",
            OidcError::MissingCode => "missing_code",
            OidcError::ProviderDenied { .. } => "provider_error",
            OidcError::ReturnUrlNotAllowed(_) => "invalid_return_url",
            OidcError::CodeExchange(_) => "code_exchange_failed",
            OidcError::MissingIdToken => "missing_id_token",
            OidcError::TokenVerification(_) => "token_verification_failed",
            OidcError::NonceMismatch => "nonce_mismatch",
            OidcError::MissingEmail => "missing_email",
            OidcError::EmailNotVerified => "email_not_verified",
            OidcError::NotEligible => "provisioning_disabled",
            OidcError::AccountInactive => "account_inactive",
            OidcError::Discovery(_) => "provider_discovery_failed",
            OidcError::Session(_) | OidcError::Database(_) | OidcError::Internal(_) => {
                "internal_error"
            }
        }
    }

    fn error_type(&self) -> &'static str {
        if matches!(
            self,
            OidcError::Session(_) | OidcError::Database(_) | OidcError::Internal(_)
        ) {
            return "server_error";
        }
        match self.status() {
            StatusCode::BAD_REQUEST => "invalid_request_error",
            StatusCode::FORBIDDEN => "permission_error",
            StatusCode::NOT_FOUND => "not_found_error",
            StatusCode::SERVICE_UNAVAILABLE => "service_unavailable_error",
            _ => "authentication_error",
        }
    }

    /// Message safe to return to the client.
    fn public_message(&self) -> String {
        match self {
            OidcError::ProviderDenied { error, description } => match description {
                Some(description) => format!("Provider returned error '{error}': {description}"),
                None => self.to_string(),
            },
            OidcError::CodeExchange(_) => {
                "Failed to exchange the authorization code with the provider".to_string()
            }
            OidcError::TokenVerification(_) => "ID token could not be verified".to_string(),
            OidcError::Discovery(_) => "OIDC provider is not reachable".to_string(),
            OidcError::Session(_) | OidcError::Database(_) | OidcError::Internal(_) => {
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.code(), "OIDC sign-in failed");
        } else {
            tracing::debug!(error = %self, code = self.code(), "OIDC sign-in rejected");
        }

        let body = ErrorResponse::with_type(self.error_type(), self.code(), self.public_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(OidcError::InvalidState("bad".into()), StatusCode::BAD_REQUEST)]
    #[case(OidcError::UnknownProvider, StatusCode::BAD_REQUEST)]
    #[case(OidcError::MissingCode, StatusCode::BAD_REQUEST)]
    #[case(OidcError::NonceMismatch, StatusCode::BAD_REQUEST)]
    #[case(OidcError::MissingEmail, StatusCode::BAD_REQUEST)]
    #[case(OidcError::ProviderNotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(OidcError::ProviderUnavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE)]
    #[case(OidcError::CodeExchange("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(OidcError::MissingIdToken, StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(OidcError::TokenVerification("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(OidcError::NotEligible, StatusCode::FORBIDDEN)]
    #[case(OidcError::AccountInactive, StatusCode::FORBIDDEN)]
    #[case(OidcError::EmailNotVerified, StatusCode::FORBIDDEN)]
    fn test_status_codes(#[case] error: OidcError, #[case] expected: StatusCode) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[test]
    fn test_policy_errors_distinct_from_protocol_errors() {
        assert_ne!(OidcError::NotEligible.code(), OidcError::AccountInactive.code());
        assert_ne!(
            OidcError::MissingIdToken.code(),
            OidcError::CodeExchange(String::new()).code()
        );
    }

    #[test]
    fn test_internal_details_not_exposed() {
        let error = OidcError::CodeExchange("upstream said: secret body".into());
        assert!(!error.public_message().contains("secret body"));

        let denied = OidcError::ProviderDenied {
            error: "access_denied".into(),
            description: Some("User cancelled".into()),
        };
        assert!(denied.public_message().contains("User cancelled"));
    }
}
