use std::sync::Arc;

use crate::{
    db::{DbError, DbPool},
    models::{CreateIdentityLink, OidcProvider, ProvisionUser, User},
};

/// Verified identity claims handed over by the callback.
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

/// How an identity was matched to its account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// An identity link already existed.
    Linked,
    /// An account with the same email existed; a link was created.
    LinkedByEmail,
    /// A new account was created.
    Provisioned,
}

#[derive(Debug, Clone)]
pub struct ResolvedIdentity {
    pub user: User,
    pub outcome: ResolutionOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("no account matches this identity and provisioning is disabled")]
    NotEligible,

    #[error(transparent)]
    Database(#[from] DbError),
}

/// Maps a verified `(provider, subject)` pair to a local account.
///
/// First match wins: existing link, then an account with the same email
/// (which gets linked), then provisioning when the provider allows it.
#[derive(Clone)]
pub struct IdentityResolver {
    db: Arc<DbPool>,
}

impl IdentityResolver {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    pub async fn resolve(
        &self,
        provider: &OidcProvider,
        claims: &IdentityClaims,
    ) -> Result<ResolvedIdentity, ResolveError> {
        if let Some(resolved) = self.find_existing(provider, claims).await? {
            return Ok(resolved);
        }

        if !provider.auto_provision {
            tracing::info!(
                provider_id = %provider.id,
                "No account for identity and provider does not auto-provision"
            );
            return Err(ResolveError::NotEligible);
        }

        let display_name = display_name(claims);
        let input = ProvisionUser {
            email: claims.email.clone(),
            workspace_name: format!("{}'s workspace", display_name),
            display_name,
            provider_id: provider.id,
            subject: claims.subject.clone(),
        };

        match self.db.users().provision(input).await {
            Ok((user, _link, workspace)) => {
                tracing::info!(
                    user_id = %user.id,
                    provider_id = %provider.id,
                    workspace_id = %workspace.id,
                    "Provisioned account from OIDC identity"
                );
                Ok(ResolvedIdentity {
                    user,
                    outcome: ResolutionOutcome::Provisioned,
                })
            }
            Err(DbError::Conflict(msg)) => {
                // A concurrent first login won the race; converge on its account.
                tracing::debug!(provider_id = %provider.id, conflict = %msg, "Provisioning raced, re-resolving");
                self.find_existing(provider, claims)
                    .await?
                    .ok_or(ResolveError::Database(DbError::Conflict(msg)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Steps (a) and (b): existing link, or link to the account with the same email.
    async fn find_existing(
        &self,
        provider: &OidcProvider,
        claims: &IdentityClaims,
    ) -> Result<Option<ResolvedIdentity>, ResolveError> {
        if let Some(user) = self.linked_user(provider, &claims.subject).await? {
            return Ok(Some(ResolvedIdentity {
                user,
                outcome: ResolutionOutcome::Linked,
            }));
        }

        let Some(user) = self.db.users().get_by_email(&claims.email).await? else {
            return Ok(None);
        };

        let link = CreateIdentityLink {
            user_id: user.id,
            provider_id: provider.id,
            subject: claims.subject.clone(),
            email: claims.email.clone(),
        };

        match self.db.identity_links().create(link).await {
            Ok(_) => {
                tracing::info!(
                    user_id = %user.id,
                    provider_id = %provider.id,
                    "Linked OIDC identity to existing account by email"
                );
                Ok(Some(ResolvedIdentity {
                    user,
                    outcome: ResolutionOutcome::LinkedByEmail,
                }))
            }
            Err(DbError::Conflict(msg)) => {
                let user = self
                    .linked_user(provider, &claims.subject)
                    .await?
                    .ok_or(DbError::Conflict(msg))?;
                Ok(Some(ResolvedIdentity {
                    user,
                    outcome: ResolutionOutcome::Linked,
                }))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn linked_user(
        &self,
        provider: &OidcProvider,
        subject: &str,
    ) -> Result<Option<User>, DbError> {
        let Some(link) = self
            .db
            .identity_links()
            .get_by_subject(provider.id, subject)
            .await?
        else {
            return Ok(None);
        };

        match self.db.users().get_by_id(link.user_id).await? {
            Some(user) => Ok(Some(user)),
            None => Err(DbError::Internal(format!(
                "identity link {} references missing user {}",
                link.id, link.user_id
            ))),
        }
    }
}

/// `name`, else `given_name family_name`, else the email's local part.
pub fn display_name(claims: &IdentityClaims) -> String {
    if let Some(name) = claims.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }

    let parts: Vec<&str> = [claims.given_name.as_deref(), claims.family_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if !parts.is_empty() {
        return parts.join(" ");
    }

    claims
        .email
        .split('@')
        .next()
        .unwrap_or(&claims.email)
        .to_string()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        db::tests::harness::{create_sqlite_pool, run_sqlite_migrations},
        models::CreateOidcProvider,
    };

    fn claims(subject: &str, email: &str) -> IdentityClaims {
        IdentityClaims {
            subject: subject.into(),
            email: email.into(),
            name: None,
            given_name: None,
            family_name: None,
        }
    }

    async fn setup() -> (Arc<DbPool>, IdentityResolver) {
        let pool = create_sqlite_pool().await;
        run_sqlite_migrations(&pool).await;
        let db = Arc::new(DbPool::from_sqlite(pool));
        let resolver = IdentityResolver::new(Arc::clone(&db));
        (db, resolver)
    }

    async fn provider(db: &DbPool, slug: &str, auto_provision: bool) -> OidcProvider {
        db.providers()
            .create(CreateOidcProvider {
                name: slug.into(),
                slug: slug.into(),
                issuer: format!("https://{slug}.example.com"),
                client_id: "client".into(),
                client_secret: "secret".into(),
                scopes: vec!["openid".into()],
                enabled: true,
                auto_provision,
            })
            .await
            .unwrap()
    }

    #[rstest]
    #[case(Some("Ann Lee"), Some("Ann"), Some("Lee"), "Ann Lee")]
    #[case(None, Some("Ann"), None, "Ann")]
    #[case(Some("  "), Some("Ann"), Some("Lee"), "Ann Lee")]
    #[case(None, None, Some("Lee"), "Lee")]
    #[case(None, None, None, "new")]
    fn test_display_name(
        #[case] name: Option<&str>,
        #[case] given: Option<&str>,
        #[case] family: Option<&str>,
        #[case] expected: &str,
    ) {
        let claims = IdentityClaims {
            name: name.map(String::from),
            given_name: given.map(String::from),
            family_name: family.map(String::from),
            ..claims("s", "new@x.com")
        };
        assert_eq!(display_name(&claims), expected);
    }

    #[tokio::test]
    async fn test_provisions_new_account() {
        let (db, resolver) = setup().await;
        let google = provider(&db, "google", true).await;

        let claims = IdentityClaims {
            given_name: Some("Ann".into()),
            ..claims("ann-sub", "new@x.com")
        };
        let resolved = resolver.resolve(&google, &claims).await.unwrap();

        assert_eq!(resolved.outcome, ResolutionOutcome::Provisioned);
        assert_eq!(resolved.user.display_name, "Ann");

        let links = db.identity_links().list_by_user(resolved.user.id).await.unwrap();
        assert_eq!(links.len(), 1);
        let workspaces = db.workspaces().list_for_user(resolved.user.id).await.unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0].workspace.name, "Ann's workspace");
    }

    #[tokio::test]
    async fn test_resolving_twice_is_idempotent() {
        let (db, resolver) = setup().await;
        let google = provider(&db, "google", true).await;
        let claims = claims("sub-1", "ann@x.com");

        let first = resolver.resolve(&google, &claims).await.unwrap();
        let second = resolver.resolve(&google, &claims).await.unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_eq!(second.outcome, ResolutionOutcome::Linked);
        assert_eq!(
            db.identity_links().list_by_user(first.user.id).await.unwrap().len(),
            1
        );
        assert_eq!(db.workspaces().list_for_user(first.user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_provisioning_gate() {
        let (db, resolver) = setup().await;
        let corp = provider(&db, "corp", false).await;

        let result = resolver.resolve(&corp, &claims("sub-1", "stranger@x.com")).await;

        assert!(matches!(result, Err(ResolveError::NotEligible)));
        assert!(db.users().get_by_email("stranger@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_links_existing_account_by_email() {
        let (db, resolver) = setup().await;
        let google = provider(&db, "google", true).await;
        let corp = provider(&db, "corp", false).await;

        let original = resolver
            .resolve(&google, &claims("google-sub", "ann@x.com"))
            .await
            .unwrap();

        // different provider, different subject, email differs only in case
        let resolved = resolver
            .resolve(&corp, &claims("corp-sub", "Ann@X.com"))
            .await
            .unwrap();

        assert_eq!(resolved.outcome, ResolutionOutcome::LinkedByEmail);
        assert_eq!(resolved.user.id, original.user.id);

        let links = db.identity_links().list_by_user(original.user.id).await.unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(db.workspaces().list_for_user(original.user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_inactive_account_still_resolves() {
        let (db, resolver) = setup().await;
        let google = provider(&db, "google", true).await;
        let claims = claims("sub-1", "ann@x.com");

        let resolved = resolver.resolve(&google, &claims).await.unwrap();
        db.users().set_active(resolved.user.id, false).await.unwrap();

        let again = resolver.resolve(&google, &claims).await.unwrap();
        assert_eq!(again.user.id, resolved.user.id);
        assert!(!again.user.is_active);
    }

    #[tokio::test]
    async fn test_concurrent_first_logins_converge() {
        let (db, resolver) = setup().await;
        let google = provider(&db, "google", true).await;
        let claims = claims("sub-1", "ann@x.com");

        let (a, b) = tokio::join!(
            resolver.resolve(&google, &claims),
            resolver.resolve(&google, &claims)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.user.id, b.user.id);
        assert_eq!(db.identity_links().list_by_user(a.user.id).await.unwrap().len(), 1);
    }
}
