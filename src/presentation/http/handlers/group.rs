//! Group Handlers

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::application::services::GroupService;
use crate::domain::Group;
use crate::infrastructure::repositories::PgGroupRepository;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Create group request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    #[serde(default)]
    pub description: String,
}

/// Add member request
#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: i64,
}

fn group_service(state: &AppState) -> GroupService<PgGroupRepository> {
    GroupService::new(Arc::new(PgGroupRepository::new(state.db.clone())))
}

/// Create a new group; the requester becomes its owner
pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let group = group_service(&state)
        .create_group(body.name, body.description, auth.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(group)))
}

/// Add a member to a group; owners and admins only
pub async fn add_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    Json(body): Json<AddMemberRequest>,
) -> Result<StatusCode, AppError> {
    group_service(&state)
        .add_member(group_id, auth.user_id, body.user_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
