use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use tenderdeck_core::domain::user::{Role, User};
use tenderdeck_core::errors::ApplicationError;
use tenderdeck_core::identity::UserStore;

use super::{decode, persistence};
use crate::DbPool;

pub struct SqlUserStore {
    pool: DbPool,
}

impl SqlUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, ApplicationError> {
    let role_raw: String = row.try_get("role").map_err(|e| decode(e.to_string()))?;
    let role: Role = role_raw
        .parse()
        .map_err(|_| decode(format!("unknown role `{role_raw}` in user store")))?;

    Ok(User {
        id: row.try_get("id").map_err(|e| decode(e.to_string()))?,
        email: row.try_get("email").map_err(|e| decode(e.to_string()))?,
        display_name: row.try_get("display_name").map_err(|e| decode(e.to_string()))?,
        role,
        assigned_group: row.try_get("assigned_group").map_err(|e| decode(e.to_string()))?,
    })
}

#[async_trait]
impl UserStore for SqlUserStore {
    async fn find_by_id(&self, id: &str) -> Result<Option<User>, ApplicationError> {
        let row = sqlx::query(
            "SELECT id, email, display_name, role, assigned_group
             FROM user_account WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, ApplicationError> {
        let row = sqlx::query(
            "SELECT id, email, display_name, role, assigned_group
             FROM user_account WHERE email = ? COLLATE NOCASE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(persistence)?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, ApplicationError> {
        let rows = sqlx::query(
            "SELECT id, email, display_name, role, assigned_group
             FROM user_account ORDER BY email ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(persistence)?;

        rows.iter().map(row_to_user).collect()
    }

    async fn upsert(&self, user: User) -> Result<(), ApplicationError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO user_account
                 (id, email, display_name, role, assigned_group, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 email = excluded.email,
                 display_name = excluded.display_name,
                 role = excluded.role,
                 assigned_group = excluded.assigned_group,
                 updated_at = excluded.updated_at",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role.as_str())
        .bind(&user.assigned_group)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(())
    }

    async fn set_role(
        &self,
        id: &str,
        role: Role,
        assigned_group: Option<String>,
    ) -> Result<bool, ApplicationError> {
        let result = sqlx::query(
            "UPDATE user_account SET role = ?, assigned_group = ?, updated_at = ? WHERE id = ?",
        )
        .bind(role.as_str())
        .bind(&assigned_group)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(persistence)?;

        Ok(result.rows_affected() == 1)
    }
}
