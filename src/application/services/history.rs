//! History Service
//!
//! Paginated message reads with the scope-partitioned page cache in
//! front of storage. Cache faults degrade to a storage read; they are
//! never surfaced to the caller.

use std::sync::Arc;

use crate::domain::{GroupRepository, Message, MessageRepository};
use crate::infrastructure::cache::{keys, Cache, MessageCacheService};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Default page size when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Upper bound on a single history page.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Read side of the message store.
pub struct HistoryService<M, G, C>
where
    M: MessageRepository,
    G: GroupRepository,
    C: Cache,
{
    messages: Arc<M>,
    groups: Arc<G>,
    cache: Arc<MessageCacheService<C>>,
}

impl<M, G, C> HistoryService<M, G, C>
where
    M: MessageRepository,
    G: GroupRepository,
    C: Cache,
{
    pub fn new(messages: Arc<M>, groups: Arc<G>, cache: Arc<MessageCacheService<C>>) -> Self {
        Self {
            messages,
            groups,
            cache,
        }
    }

    /// Public feed page, newest first.
    pub async fn public_page(&self, limit: i64, offset: i64) -> Result<Vec<Message>, AppError> {
        let (limit, offset) = clamp_page(limit, offset);
        let key = keys::public_page(limit, offset);

        if let Some(page) = self.cached(&key).await {
            return Ok(page);
        }

        let page = self.messages.public_page(limit, offset).await?;
        self.store(&key, &page).await;
        Ok(page)
    }

    /// Private conversation page between the requester and one other
    /// user, newest first. The requester is a participant by
    /// construction, so no further authorization is needed.
    pub async fn private_page(
        &self,
        user_id: i64,
        other_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        let (limit, offset) = clamp_page(limit, offset);
        let key = keys::private_page(user_id, other_id, limit, offset);

        if let Some(page) = self.cached(&key).await {
            return Ok(page);
        }

        let page = self
            .messages
            .private_page(user_id, other_id, limit, offset)
            .await?;
        self.store(&key, &page).await;
        Ok(page)
    }

    /// Group page, newest first. Requires membership.
    pub async fn group_page(
        &self,
        group_id: i64,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Message>, AppError> {
        if !self.groups.is_member(group_id, user_id).await? {
            return Err(AppError::Forbidden("Not a member of the group".into()));
        }

        let (limit, offset) = clamp_page(limit, offset);
        let key = keys::group_page(group_id, limit, offset);

        if let Some(page) = self.cached(&key).await {
            return Ok(page);
        }

        let page = self.messages.group_page(group_id, limit, offset).await?;
        self.store(&key, &page).await;
        Ok(page)
    }

    async fn cached(&self, key: &str) -> Option<Vec<Message>> {
        match self.cache.get_page(key).await {
            Ok(Some(page)) => {
                metrics::record_cache_lookup(true);
                Some(page)
            }
            Ok(None) => {
                metrics::record_cache_lookup(false);
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed, falling back to storage");
                None
            }
        }
    }

    async fn store(&self, key: &str, page: &[Message]) {
        if let Err(e) = self.cache.store_page(key, page).await {
            tracing::warn!(error = %e, key = %key, "Cache write failed");
        }
    }
}

/// Bound limit and offset so the cache key space stays finite and
/// storage queries stay cheap.
fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.clamp(1, MAX_PAGE_SIZE), offset.max(0))
}
