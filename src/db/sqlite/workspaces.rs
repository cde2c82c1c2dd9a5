use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::common::parse_uuid;
use crate::{
    db::{
        error::{DbError, DbResult},
        repos::WorkspaceRepo,
    },
    models::{Workspace, WorkspaceMembership, WorkspaceRole},
};

pub struct SqliteWorkspaceRepo {
    pool: SqlitePool,
}

impl SqliteWorkspaceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkspaceRepo for SqliteWorkspaceRepo {
    async fn list_for_user(&self, user_id: Uuid) -> DbResult<Vec<WorkspaceMembership>> {
        let rows = sqlx::query(
            r#"
            SELECT w.id, w.name, w.created_by, w.created_at, m.role
            FROM workspaces w
            JOIN workspace_members m ON m.workspace_id = w.id
            WHERE m.user_id = ?
            ORDER BY w.created_at, w.id
            "#,
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let role_str: String = row.get("role");
                let role = WorkspaceRole::parse(&role_str).ok_or_else(|| {
                    DbError::Internal(format!("Invalid workspace role in database: {}", role_str))
                })?;

                Ok(WorkspaceMembership {
                    workspace: Workspace {
                        id: parse_uuid(&row.get::<String, _>("id"))?,
                        name: row.get("name"),
                        created_by: parse_uuid(&row.get::<String, _>("created_by"))?,
                        created_at: row.get("created_at"),
                    },
                    role,
                })
            })
            .collect()
    }
}
