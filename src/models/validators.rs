use std::{borrow::Cow, sync::LazyLock};

use regex::Regex;
use validator::ValidationError;

/// URL-friendly slugs: lowercase alphanumeric runs joined by single hyphens.
/// Examples: "google", "okta-prod", "azure-ad-2"
pub static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid"));

const MAX_SCOPE_LENGTH: usize = 128;
const MAX_SCOPES_COUNT: usize = 32;

/// Validate OAuth2 scope tokens.
///
/// Scopes are stored space-separated, so a scope containing whitespace would
/// silently split into two.
pub fn validate_scopes(scopes: &[String]) -> Result<(), ValidationError> {
    if scopes.len() > MAX_SCOPES_COUNT {
        let mut err = ValidationError::new("too_many_scopes");
        err.message = Some(Cow::Owned(format!(
            "Maximum {} scopes allowed",
            MAX_SCOPES_COUNT
        )));
        return Err(err);
    }

    for scope in scopes {
        if scope.trim().is_empty() {
            let mut err = ValidationError::new("empty_scope");
            err.message = Some(Cow::Borrowed("Scopes cannot be empty or whitespace-only"));
            return Err(err);
        }
        if scope.chars().any(char::is_whitespace) {
            let mut err = ValidationError::new("scope_whitespace");
            err.message = Some(Cow::Owned(format!(
                "Scope '{}' cannot contain whitespace",
                scope
            )));
            return Err(err);
        }
        if scope.len() > MAX_SCOPE_LENGTH {
            let mut err = ValidationError::new("scope_too_long");
            err.message = Some(Cow::Owned(format!(
                "Scopes cannot exceed {} characters",
                MAX_SCOPE_LENGTH
            )));
            return Err(err);
        }
    }
    Ok(())
}
