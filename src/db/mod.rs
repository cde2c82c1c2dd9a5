mod error;
pub mod repos;
pub mod sqlite;

#[cfg(test)]
pub mod tests;

use std::{sync::Arc, time::Duration};

pub use error::{DbError, DbResult};
pub use repos::*;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::config::DatabaseConfig;

/// Cached repository trait objects, created once at startup.
struct CachedRepos {
    providers: Arc<dyn OidcProviderRepo>,
    identity_links: Arc<dyn IdentityLinkRepo>,
    users: Arc<dyn UserRepo>,
    workspaces: Arc<dyn WorkspaceRepo>,
}

impl CachedRepos {
    fn sqlite(pool: &sqlx::SqlitePool) -> Self {
        Self {
            providers: Arc::new(sqlite::SqliteOidcProviderRepo::new(pool.clone())),
            identity_links: Arc::new(sqlite::SqliteIdentityLinkRepo::new(pool.clone())),
            users: Arc::new(sqlite::SqliteUserRepo::new(pool.clone())),
            workspaces: Arc::new(sqlite::SqliteWorkspaceRepo::new(pool.clone())),
        }
    }
}

/// Database pool with its repositories.
///
/// Repositories are cached at construction time to avoid allocation on each access.
pub struct DbPool {
    pool: sqlx::SqlitePool,
    repos: CachedRepos,
}

impl DbPool {
    /// Create a DbPool from an existing SQLite pool.
    /// Primarily useful for testing.
    pub fn from_sqlite(pool: sqlx::SqlitePool) -> Self {
        let repos = CachedRepos::sqlite(&pool);
        DbPool { pool, repos }
    }

    /// Connect using the database section of the config.
    pub async fn from_config(config: &DatabaseConfig) -> DbResult<Self> {
        match config {
            DatabaseConfig::Sqlite(cfg) => {
                let pool = SqlitePoolOptions::new()
                    .max_connections(cfg.max_connections)
                    .connect_with(
                        SqliteConnectOptions::new()
                            .filename(&cfg.path)
                            .create_if_missing(cfg.create_if_missing)
                            .foreign_keys(true)
                            .journal_mode(if cfg.wal_mode {
                                SqliteJournalMode::Wal
                            } else {
                                SqliteJournalMode::Delete
                            })
                            .busy_timeout(Duration::from_millis(cfg.busy_timeout_ms)),
                    )
                    .await?;

                Ok(Self::from_sqlite(pool))
            }
        }
    }

    /// Run database migrations using sqlx's migration runner.
    /// This creates and manages a `_sqlx_migrations` table.
    pub async fn run_migrations(&self) -> DbResult<()> {
        tracing::info!("Running SQLite migrations");
        sqlx::migrate!("./migrations_sqlx/sqlite")
            .run(&self.pool)
            .await?;
        tracing::info!("SQLite migrations completed successfully");
        Ok(())
    }

    /// Get OIDC provider repository
    pub fn providers(&self) -> Arc<dyn OidcProviderRepo> {
        Arc::clone(&self.repos.providers)
    }

    /// Get identity link repository
    pub fn identity_links(&self) -> Arc<dyn IdentityLinkRepo> {
        Arc::clone(&self.repos.identity_links)
    }

    /// Get user repository
    pub fn users(&self) -> Arc<dyn UserRepo> {
        Arc::clone(&self.repos.users)
    }

    /// Get workspace repository
    pub fn workspaces(&self) -> Arc<dyn WorkspaceRepo> {
        Arc::clone(&self.repos.workspaces)
    }

    pub async fn health_check(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
