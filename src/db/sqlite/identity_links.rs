use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::IdentityLinkRepo,
    },
    models::{CreateIdentityLink, IdentityLink},
};

pub struct SqliteIdentityLinkRepo {
    pool: SqlitePool,
}

impl SqliteIdentityLinkRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub(super) fn parse_link(row: &sqlx::sqlite::SqliteRow) -> DbResult<IdentityLink> {
        Ok(IdentityLink {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            user_id: parse_uuid(&row.get::<String, _>("user_id"))?,
            provider_id: parse_uuid(&row.get::<String, _>("provider_id"))?,
            subject: row.get("subject"),
            email: row.get("email"),
            created_at: row.get("created_at"),
        })
    }

    /// Insert a link on any executor so account provisioning can reuse it
    /// inside its transaction.
    pub(super) async fn insert<'e, E>(executor: E, input: CreateIdentityLink) -> DbResult<IdentityLink>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let id = Uuid::new_v4();
        let now = chrono::Utc::now();

        sqlx::query(
            r#"
            INSERT INTO identity_links (id, user_id, provider_id, subject, email, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(input.user_id.to_string())
        .bind(input.provider_id.to_string())
        .bind(&input.subject)
        .bind(&input.email)
        .bind(now)
        .execute(executor)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict("Identity is already linked to an account".into())
            }
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbError::Validation("Identity link references an unknown user or provider".into())
            }
            _ => DbError::from(e),
        })?;

        Ok(IdentityLink {
            id,
            user_id: input.user_id,
            provider_id: input.provider_id,
            subject: input.subject,
            email: input.email,
            created_at: now,
        })
    }
}

#[async_trait]
impl IdentityLinkRepo for SqliteIdentityLinkRepo {
    async fn get_by_subject(
        &self,
        provider_id: Uuid,
        subject: &str,
    ) -> DbResult<Option<IdentityLink>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, provider_id, subject, email, created_at
            FROM identity_links
            WHERE provider_id = ? AND subject = ?
            "#,
        )
        .bind(provider_id.to_string())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_link).transpose()
    }

    async fn create(&self, input: CreateIdentityLink) -> DbResult<IdentityLink> {
        Self::insert(&self.pool, input).await
    }

    async fn list_by_user(&self, user_id: Uuid) -> DbResult<Vec<IdentityLink>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, provider_id, subject, email, created_at
            FROM identity_links
            WHERE user_id = ?
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_link).collect()
    }
}
