//! Group Repository Implementation
//!
//! PostgreSQL implementation of group and membership storage. Group
//! creation enrolls the owner in the same transaction so a group can
//! never exist without its owner as a member.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Group, GroupDraft, GroupRepository, GroupRole};
use crate::shared::error::AppError;

/// PostgreSQL group repository implementation.
pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    /// Creates a new PgGroupRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for group queries.
#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: i64,
    name: String,
    description: String,
    owner_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn into_group(self) -> Group {
        Group {
            id: self.id,
            name: self.name,
            description: self.description,
            owner_id: self.owner_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn create(&self, draft: &GroupDraft) -> Result<Group, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            INSERT INTO groups (name, description, owner_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, owner_id, created_at, updated_at
            "#,
        )
        .bind(&draft.name)
        .bind(&draft.description)
        .bind(draft.owner_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, role)
            VALUES ($1, $2, 'owner')
            "#,
        )
        .bind(row.id)
        .bind(draft.owner_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.into_group())
    }

    async fn add_member(
        &self,
        group_id: i64,
        user_id: i64,
        role: GroupRole,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO group_members (group_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (group_id, user_id) DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn is_member(&self, group_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM group_members WHERE group_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn member_role(
        &self,
        group_id: i64,
        user_id: i64,
    ) -> Result<Option<GroupRole>, AppError> {
        let role: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT role FROM group_members WHERE group_id = $1 AND user_id = $2
            "#,
        )
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role.map(|(r,)| GroupRole::from_str(&r)))
    }

    async fn member_group_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT group_id FROM group_members WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
