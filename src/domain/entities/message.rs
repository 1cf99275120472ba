//! Message entity and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Message kinds matching the PostgreSQL ENUM `message_kind`.
///
/// Database definition:
/// ```sql
/// CREATE TYPE message_kind AS ENUM ('public', 'private', 'group');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Visible to every connected client
    #[default]
    Public,
    /// Between a sender and a single receiver
    Private,
    /// Addressed to the members of one group
    Group,
}

impl MessageKind {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "private" => Self::Private,
            "group" => Self::Group,
            _ => Self::Public,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted chat message. Immutable once written.
///
/// Maps to the `messages` table:
/// - id: BIGSERIAL PRIMARY KEY
/// - kind: message_kind NOT NULL
/// - content: TEXT NOT NULL
/// - user_id: BIGINT NOT NULL (sender)
/// - username: TEXT NOT NULL (sender name at send time)
/// - receiver_id: BIGINT NULL -- private messages
/// - group_id: BIGINT NULL -- group messages
/// - created_at: TIMESTAMPTZ NOT NULL DEFAULT NOW()
///
/// The serde representation doubles as the outbound wire frame, so the
/// kind field is named `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,

    #[serde(rename = "type")]
    pub kind: MessageKind,

    pub content: String,

    /// Sender user ID
    pub user_id: i64,

    /// Sender username at the time of sending
    pub username: String,

    /// Receiver for private messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<i64>,

    /// Target group for group messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,

    /// Assigned by storage on insert
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Scope check used for dispatch targeting: would a connection
    /// bound to `user_id` with the given group memberships receive
    /// this message?
    pub fn is_visible_to(&self, user_id: i64, groups: &[i64]) -> bool {
        match self.kind {
            MessageKind::Public => true,
            MessageKind::Private => {
                self.user_id == user_id || self.receiver_id == Some(user_id)
            }
            MessageKind::Group => self.group_id.is_some_and(|g| groups.contains(&g)),
        }
    }
}

/// A validated submission, before storage has assigned id + timestamp.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub kind: MessageKind,
    pub content: String,
    pub user_id: i64,
    pub username: String,
    pub receiver_id: Option<i64>,
    pub group_id: Option<i64>,
}

/// Repository trait for Message data access operations.
///
/// Pages are ordered by `created_at DESC` (newest first).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert a draft; storage assigns id and created_at atomically.
    async fn insert(&self, draft: &MessageDraft) -> Result<Message, AppError>;

    /// Page of public messages.
    async fn public_page(&self, limit: i64, offset: i64) -> Result<Vec<Message>, AppError>;

    /// Page of private messages between two users, in either direction.
    async fn private_page(
        &self,
        user_id: i64,
        other_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError>;

    /// Page of one group's messages.
    async fn group_page(
        &self,
        group_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError>;
}
