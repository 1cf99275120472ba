//! Group Service
//!
//! Group lifecycle and membership administration.

use std::sync::Arc;

use crate::domain::{Group, GroupDraft, GroupRepository, GroupRole};
use crate::shared::error::AppError;

pub struct GroupService<G: GroupRepository> {
    groups: Arc<G>,
}

impl<G: GroupRepository> GroupService<G> {
    pub fn new(groups: Arc<G>) -> Self {
        Self { groups }
    }

    /// Create a group. The creator becomes its owner.
    pub async fn create_group(
        &self,
        name: String,
        description: String,
        owner_id: i64,
    ) -> Result<Group, AppError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("Group name cannot be empty".into()));
        }

        let group = self
            .groups
            .create(&GroupDraft {
                name,
                description,
                owner_id,
            })
            .await?;
        tracing::info!(group_id = group.id, owner_id, "Group created");
        Ok(group)
    }

    /// Add a user to a group. Only owners and admins may add members;
    /// new members always join with the member role.
    pub async fn add_member(
        &self,
        group_id: i64,
        actor_id: i64,
        user_id: i64,
    ) -> Result<(), AppError> {
        let actor_role = self
            .groups
            .member_role(group_id, actor_id)
            .await?
            .ok_or_else(|| AppError::Forbidden("Not a member of the group".into()))?;

        if !actor_role.can_manage_members() {
            return Err(AppError::Forbidden(
                "Only owners and admins can add members".into(),
            ));
        }

        self.groups
            .add_member(group_id, user_id, GroupRole::Member)
            .await?;
        tracing::info!(group_id, user_id, actor_id, "Member added to group");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockGroupRepository;
    use chrono::Utc;

    fn group(id: i64, owner_id: i64) -> Group {
        let now = Utc::now();
        Group {
            id,
            name: "backend".into(),
            description: String::new(),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_rejects_blank_names() {
        let mut groups = MockGroupRepository::new();
        groups.expect_create().never();

        let service = GroupService::new(Arc::new(groups));
        let err = service
            .create_group("   ".into(), String::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn create_trims_the_name() {
        let mut groups = MockGroupRepository::new();
        groups
            .expect_create()
            .withf(|draft| draft.name == "backend" && draft.owner_id == 1)
            .returning(|_| Ok(group(7, 1)));

        let service = GroupService::new(Arc::new(groups));
        let created = service
            .create_group("  backend  ".into(), String::new(), 1)
            .await
            .unwrap();
        assert_eq!(created.id, 7);
    }

    #[tokio::test]
    async fn members_cannot_add_members() {
        let mut groups = MockGroupRepository::new();
        groups
            .expect_member_role()
            .returning(|_, _| Ok(Some(GroupRole::Member)));
        groups.expect_add_member().never();

        let service = GroupService::new(Arc::new(groups));
        let err = service.add_member(7, 2, 3).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn outsiders_cannot_add_members() {
        let mut groups = MockGroupRepository::new();
        groups.expect_member_role().returning(|_, _| Ok(None));
        groups.expect_add_member().never();

        let service = GroupService::new(Arc::new(groups));
        let err = service.add_member(7, 9, 3).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn admins_add_members_with_the_member_role() {
        let mut groups = MockGroupRepository::new();
        groups
            .expect_member_role()
            .returning(|_, _| Ok(Some(GroupRole::Admin)));
        groups
            .expect_add_member()
            .once()
            .withf(|group_id, user_id, role| {
                *group_id == 7 && *user_id == 3 && *role == GroupRole::Member
            })
            .returning(|_, _, _| Ok(()));

        let service = GroupService::new(Arc::new(groups));
        service.add_member(7, 2, 3).await.unwrap();
    }
}
