use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::{decode_scopes, encode_scopes, parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::OidcProviderRepo,
    },
    models::{CreateOidcProvider, OidcProvider, UpdateOidcProvider},
};

const PROVIDER_COLUMNS: &str = "id, name, slug, issuer, client_id, client_secret, scopes, \
                                enabled, auto_provision, created_at, updated_at";

pub struct SqliteOidcProviderRepo {
    pool: SqlitePool,
}

impl SqliteOidcProviderRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_provider(row: &sqlx::sqlite::SqliteRow) -> DbResult<OidcProvider> {
        Ok(OidcProvider {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            name: row.get("name"),
            slug: row.get("slug"),
            issuer: row.get("issuer"),
            client_id: row.get("client_id"),
            client_secret: row.get("client_secret"),
            scopes: decode_scopes(&row.get::<String, _>("scopes")),
            enabled: row.get::<i32, _>("enabled") != 0,
            auto_provision: row.get::<i32, _>("auto_provision") != 0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn map_slug_conflict(e: sqlx::Error, slug: &str) -> DbError {
        match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(format!("Provider with slug '{}' already exists", slug))
            }
            _ => DbError::from(e),
        }
    }
}

#[async_trait]
impl OidcProviderRepo for SqliteOidcProviderRepo {
    async fn create(&self, input: CreateOidcProvider) -> DbResult<OidcProvider> {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO oidc_providers (
                id, name, slug, issuer, client_id, client_secret, scopes,
                enabled, auto_provision, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&input.name)
        .bind(&input.slug)
        .bind(&input.issuer)
        .bind(&input.client_id)
        .bind(&input.client_secret)
        .bind(encode_scopes(&input.scopes))
        .bind(input.enabled as i32)
        .bind(input.auto_provision as i32)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_slug_conflict(e, &input.slug))?;

        Ok(OidcProvider {
            id,
            name: input.name,
            slug: input.slug,
            issuer: input.issuer,
            client_id: input.client_id,
            client_secret: input.client_secret,
            scopes: input.scopes,
            enabled: input.enabled,
            auto_provision: input.auto_provision,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<OidcProvider>> {
        let row = sqlx::query(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM oidc_providers WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_provider).transpose()
    }

    async fn get_by_slug(&self, slug: &str) -> DbResult<Option<OidcProvider>> {
        let row = sqlx::query(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM oidc_providers WHERE slug = ?"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_provider).transpose()
    }

    async fn list(&self) -> DbResult<Vec<OidcProvider>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM oidc_providers ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_provider).collect()
    }

    async fn list_enabled(&self) -> DbResult<Vec<OidcProvider>> {
        let rows = sqlx::query(&format!(
            "SELECT {PROVIDER_COLUMNS} FROM oidc_providers WHERE enabled = 1 ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_provider).collect()
    }

    async fn update(&self, id: Uuid, input: UpdateOidcProvider) -> DbResult<OidcProvider> {
        // Fetch existing record to use as fallback for optional fields
        let existing = self.get_by_id(id).await?.ok_or(DbError::NotFound)?;

        let merged = OidcProvider {
            id,
            name: input.name.unwrap_or(existing.name),
            slug: input.slug.unwrap_or(existing.slug),
            issuer: input.issuer.unwrap_or(existing.issuer),
            client_id: input.client_id.unwrap_or(existing.client_id),
            client_secret: input.client_secret.unwrap_or(existing.client_secret),
            scopes: input.scopes.unwrap_or(existing.scopes),
            enabled: input.enabled.unwrap_or(existing.enabled),
            auto_provision: input.auto_provision.unwrap_or(existing.auto_provision),
            created_at: existing.created_at,
            // Strictly increasing so the registry can order concurrent rebuilds
            updated_at: chrono::Utc::now().max(existing.updated_at + chrono::Duration::microseconds(1)),
        };

        let result = sqlx::query(
            r#"
            UPDATE oidc_providers SET
                name = ?, slug = ?, issuer = ?, client_id = ?, client_secret = ?,
                scopes = ?, enabled = ?, auto_provision = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&merged.name)
        .bind(&merged.slug)
        .bind(&merged.issuer)
        .bind(&merged.client_id)
        .bind(&merged.client_secret)
        .bind(encode_scopes(&merged.scopes))
        .bind(merged.enabled as i32)
        .bind(merged.auto_provision as i32)
        .bind(merged.updated_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_slug_conflict(e, &merged.slug))?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        Ok(merged)
    }

    async fn delete(&self, id: Uuid) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM identity_links WHERE provider_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM oidc_providers WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back
            return Err(DbError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
