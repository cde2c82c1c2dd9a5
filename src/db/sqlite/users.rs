use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{SqliteIdentityLinkRepo, common::parse_uuid};
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::UserRepo,
    },
    models::{CreateIdentityLink, IdentityLink, ProvisionUser, User, Workspace, WorkspaceRole},
};

pub struct SqliteUserRepo {
    pool: SqlitePool,
}

impl SqliteUserRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn parse_user(row: &sqlx::sqlite::SqliteRow) -> DbResult<User> {
        Ok(User {
            id: parse_uuid(&row.get::<String, _>("id"))?,
            email: row.get("email"),
            display_name: row.get("display_name"),
            is_active: row.get::<i32, _>("is_active") != 0,
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl UserRepo for SqliteUserRepo {
    async fn get_by_id(&self, id: Uuid) -> DbResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, email, display_name, is_active, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_user).transpose()
    }

    async fn get_by_email(&self, email: &str) -> DbResult<Option<User>> {
        // `email` is declared COLLATE NOCASE
        let row = sqlx::query(
            r#"
            SELECT id, email, display_name, is_active, created_at, updated_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::parse_user).transpose()
    }

    async fn set_active(&self, id: Uuid, active: bool) -> DbResult<User> {
        let now = chrono::Utc::now();

        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active as i32)
            .bind(now)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }

    async fn provision(&self, input: ProvisionUser) -> DbResult<(User, IdentityLink, Workspace)> {
        let user_id = Uuid::new_v4();
        let workspace_id = Uuid::new_v4();
        let now = chrono::Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, email, display_name, is_active, created_at, updated_at)
            VALUES (?, ?, ?, 1, ?, ?)
            "#,
        )
        .bind(user_id.to_string())
        .bind(&input.email)
        .bind(&input.display_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                DbError::Conflict(format!("User with email '{}' already exists", input.email))
            }
            _ => DbError::from(e),
        })?;

        let link = SqliteIdentityLinkRepo::insert(
            &mut *tx,
            CreateIdentityLink {
                user_id,
                provider_id: input.provider_id,
                subject: input.subject,
                email: input.email.clone(),
            },
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO workspaces (id, name, created_by, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(workspace_id.to_string())
        .bind(&input.workspace_name)
        .bind(user_id.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO workspace_members (workspace_id, user_id, role, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(workspace_id.to_string())
        .bind(user_id.to_string())
        .bind(WorkspaceRole::Admin.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let user = User {
            id: user_id,
            email: input.email,
            display_name: input.display_name,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let workspace = Workspace {
            id: workspace_id,
            name: input.workspace_name,
            created_by: user_id,
            created_at: now,
        };

        Ok((user, link, workspace))
    }
}
