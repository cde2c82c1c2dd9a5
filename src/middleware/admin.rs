//! API-key guard for the admin provider routes.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

use crate::{AppState, routes::admin::AdminError};

/// Require the configured admin API key.
///
/// When `auth.admin` is not configured the request passes through; config
/// validation only allows that on a loopback listener.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AdminError> {
    let Some(admin) = &state.config.auth.admin else {
        return Ok(next.run(req).await);
    };

    let Some(provided_key) = extract_api_key(req.headers()) else {
        tracing::debug!(path = %req.uri().path(), "Admin request without API key");
        return Err(AdminError::Unauthorized);
    };

    let keys_match: bool = provided_key
        .as_bytes()
        .ct_eq(admin.api_key.as_bytes())
        .into();
    if !keys_match {
        tracing::warn!(path = %req.uri().path(), "Admin request with invalid API key");
        return Err(AdminError::Unauthorized);
    }

    Ok(next.run(req).await)
}

/// Extract API key from request headers.
///
/// Checks in order:
/// 1. `Authorization: Bearer <key>`
/// 2. `X-API-Key: <key>`
pub fn extract_api_key(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(key) = auth_str.strip_prefix("Bearer ")
    {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    if let Some(api_key_header) = headers.get("X-API-Key")
        && let Ok(key) = api_key_header.to_str()
    {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer admin-key"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("admin-key"));
    }

    #[test]
    fn test_extract_x_api_key() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("  admin-key "));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("admin-key"));
    }

    #[test]
    fn test_bearer_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer first"));
        headers.insert("x-api-key", HeaderValue::from_static("second"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("first"));
    }

    #[test]
    fn test_missing_or_blank() {
        let mut headers = HeaderMap::new();
        assert!(extract_api_key(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_api_key(&headers).is_none());

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_api_key(&headers).is_none());
    }
}
