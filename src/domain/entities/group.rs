//! Group entity and repository trait.
//!
//! Maps to the `groups` and `group_members` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// A chat group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Member roles within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Owner,
    Admin,
    Member,
}

impl GroupRole {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "owner" => Self::Owner,
            "admin" => Self::Admin,
            _ => Self::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    /// Owners and admins may add members.
    pub fn can_manage_members(&self) -> bool {
        matches!(self, Self::Owner | Self::Admin)
    }
}

/// Fields for creating a new group; storage assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct GroupDraft {
    pub name: String,
    pub description: String,
    pub owner_id: i64,
}

/// Repository trait for group and membership data access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    /// Create a group and enroll the owner as its first member.
    async fn create(&self, draft: &GroupDraft) -> Result<Group, AppError>;

    /// Add a user to a group with the given role.
    async fn add_member(&self, group_id: i64, user_id: i64, role: GroupRole)
        -> Result<(), AppError>;

    /// Membership check used for authorization.
    async fn is_member(&self, group_id: i64, user_id: i64) -> Result<bool, AppError>;

    /// Role of a user in a group, if a member.
    async fn member_role(&self, group_id: i64, user_id: i64)
        -> Result<Option<GroupRole>, AppError>;

    /// All group ids a user belongs to (loaded at session start for
    /// dispatch targeting).
    async fn member_group_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_str() {
        for role in [GroupRole::Owner, GroupRole::Admin, GroupRole::Member] {
            assert_eq!(GroupRole::from_str(role.as_str()), role);
        }
    }

    #[test]
    fn only_owner_and_admin_manage_members() {
        assert!(GroupRole::Owner.can_manage_members());
        assert!(GroupRole::Admin.can_manage_members());
        assert!(!GroupRole::Member.can_manage_members());
    }
}
