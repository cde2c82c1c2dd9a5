//! Return URL allow-list.

use url::Url;

use super::OidcError;

/// Restricts where a completed sign-in may redirect.
///
/// An empty allow-list accepts any return URL. Otherwise absolute URLs must
/// match a configured origin and relative URLs must be a rooted path.
#[derive(Debug, Clone, Default)]
pub struct ReturnUrlPolicy {
    allowed_origins: Vec<url::Origin>,
}

impl ReturnUrlPolicy {
    /// Build from `scheme://host[:port]` strings. Entries that do not parse are
    /// ignored (config validation rejects them earlier).
    pub fn new(origins: &[String]) -> Self {
        let allowed_origins = origins
            .iter()
            .filter_map(|o| Url::parse(o).ok())
            .map(|u| u.origin())
            .filter(|o| o.is_tuple())
            .collect();
        Self { allowed_origins }
    }

    pub fn is_enforced(&self) -> bool {
        !self.allowed_origins.is_empty()
    }

    pub fn check(&self, return_url: &str) -> Result<(), OidcError> {
        if !self.is_enforced() {
            return Ok(());
        }

        if return_url.starts_with('/') {
            // "//host" and "/\host" are scheme-relative in browsers
            if return_url.starts_with("//") || return_url.starts_with("/\\") {
                return Err(OidcError::ReturnUrlNotAllowed(return_url.to_string()));
            }
            return Ok(());
        }

        let parsed = Url::parse(return_url)
            .map_err(|_| OidcError::ReturnUrlNotAllowed(return_url.to_string()))?;
        if self.allowed_origins.contains(&parsed.origin()) {
            Ok(())
        } else {
            Err(OidcError::ReturnUrlNotAllowed(return_url.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn policy() -> ReturnUrlPolicy {
        ReturnUrlPolicy::new(&[
            "https://app.example.com".into(),
            "http://localhost:3000".into(),
        ])
    }

    #[test]
    fn test_empty_policy_allows_everything() {
        let policy = ReturnUrlPolicy::new(&[]);
        assert!(!policy.is_enforced());
        assert!(policy.check("https://evil.example.net/phish").is_ok());
        assert!(policy.check("//evil.example.net").is_ok());
    }

    #[rstest]
    #[case("https://app.example.com/links?tab=1")]
    #[case("https://app.example.com")]
    #[case("http://localhost:3000/callback")]
    #[case("/dashboard")]
    #[case("/")]
    fn test_allowed(#[case] url: &str) {
        assert!(policy().check(url).is_ok());
    }

    #[rstest]
    #[case("https://evil.example.net/")]
    #[case("http://app.example.com/")] // scheme differs
    #[case("https://app.example.com:8443/")] // port differs
    #[case("http://localhost:3001/")]
    #[case("//evil.example.net/path")]
    #[case("/\\evil.example.net")]
    #[case("javascript:alert(1)")]
    #[case("dashboard")]
    #[case("")]
    fn test_rejected(#[case] url: &str) {
        assert!(matches!(
            policy().check(url),
            Err(OidcError::ReturnUrlNotAllowed(_))
        ));
    }
}
