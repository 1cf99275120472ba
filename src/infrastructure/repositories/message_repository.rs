//! Message Repository Implementation
//!
//! PostgreSQL implementation of message storage. Inserts assign id and
//! created_at in a single statement; pages are newest-first with
//! limit/offset pagination.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{Message, MessageDraft, MessageKind, MessageRepository};
use crate::shared::error::AppError;

/// Upper bound on a single history page.
const MAX_PAGE_SIZE: i64 = 100;

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// Maps to the messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    kind: String, // PostgreSQL enum maps to string
    content: String,
    user_id: i64,
    username: String,
    receiver_id: Option<i64>,
    group_id: Option<i64>,
    created_at: DateTime<Utc>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Message {
        Message {
            id: self.id,
            kind: MessageKind::from_str(&self.kind),
            content: self.content,
            user_id: self.user_id,
            username: self.username,
            receiver_id: self.receiver_id,
            group_id: self.group_id,
            created_at: self.created_at,
        }
    }
}

fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_PAGE_SIZE), offset.max(0))
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    /// Insert a draft. The database assigns id and created_at in the
    /// same statement, so both are consistent with insertion order.
    async fn insert(&self, draft: &MessageDraft) -> Result<Message, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (kind, content, user_id, username, receiver_id, group_id)
            VALUES ($1::message_kind, $2, $3, $4, $5, $6)
            RETURNING id, kind::text as kind, content, user_id, username,
                      receiver_id, group_id, created_at
            "#,
        )
        .bind(draft.kind.as_str())
        .bind(&draft.content)
        .bind(draft.user_id)
        .bind(&draft.username)
        .bind(draft.receiver_id)
        .bind(draft.group_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_message())
    }

    async fn public_page(&self, limit: i64, offset: i64) -> Result<Vec<Message>, AppError> {
        let (limit, offset) = clamp_page(limit, offset);

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, kind::text as kind, content, user_id, username,
                   receiver_id, group_id, created_at
            FROM messages
            WHERE kind = 'public'
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    /// Private history between two users, matched in both directions.
    async fn private_page(
        &self,
        user_id: i64,
        other_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let (limit, offset) = clamp_page(limit, offset);

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, kind::text as kind, content, user_id, username,
                   receiver_id, group_id, created_at
            FROM messages
            WHERE kind = 'private' AND (
                (user_id = $1 AND receiver_id = $2) OR
                (user_id = $2 AND receiver_id = $1)
            )
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }

    async fn group_page(
        &self,
        group_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let (limit, offset) = clamp_page(limit, offset);

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, kind::text as kind, content, user_id, username,
                   receiver_id, group_id, created_at
            FROM messages
            WHERE kind = 'group' AND group_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(group_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_message()).collect())
    }
}
