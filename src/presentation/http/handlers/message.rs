//! Message History Handlers

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::application::services::history::{HistoryService, DEFAULT_PAGE_SIZE};
use crate::domain::Message;
use crate::infrastructure::repositories::{PgGroupRepository, PgMessageRepository};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// Pagination query parameters
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    fn resolve(&self) -> (i64, i64) {
        (
            self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            self.offset.unwrap_or(0),
        )
    }
}

fn history_service(
    state: &AppState,
) -> HistoryService<PgMessageRepository, PgGroupRepository, crate::infrastructure::cache::RedisCache> {
    HistoryService::new(
        Arc::new(PgMessageRepository::new(state.db.clone())),
        Arc::new(PgGroupRepository::new(state.db.clone())),
        state.cache.clone(),
    )
}

/// Get the public feed, newest first
pub async fn get_public_messages(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let (limit, offset) = query.resolve();
    let messages = history_service(&state).public_page(limit, offset).await?;
    Ok(Json(messages))
}

/// Get the private conversation between the requester and another user
pub async fn get_private_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(other_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let (limit, offset) = query.resolve();
    let messages = history_service(&state)
        .private_page(auth.user_id, other_id, limit, offset)
        .await?;
    Ok(Json(messages))
}

/// Get a group's message history; members only
pub async fn get_group_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Message>>, AppError> {
    let (limit, offset) = query.resolve();
    let messages = history_service(&state)
        .group_page(group_id, auth.user_id, limit, offset)
        .await?;
    Ok(Json(messages))
}
