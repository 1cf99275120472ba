//! Message Page Cache
//!
//! Key scheme and invalidation rules for cached history pages, layered
//! on top of the generic `Cache` trait.
//!
//! Keys are partitioned by scope so that a write only invalidates the
//! pages it can affect:
//!
//! - `messages:public:{limit}:{offset}`
//! - `messages:private:{a}:{b}:{limit}:{offset}` (requester ordering)
//! - `messages:group:{g}:{limit}:{offset}`
//!
//! A private write invalidates both participant orderings because a
//! page may have been cached under either.

use std::sync::Arc;

use crate::domain::{Message, MessageKind};
use crate::shared::error::AppError;

use super::cache_service::Cache;

/// Cache key and invalidation pattern builders for message pages.
pub mod keys {
    /// Key for one public feed page.
    pub fn public_page(limit: i64, offset: i64) -> String {
        format!("messages:public:{}:{}", limit, offset)
    }

    /// Key for one private conversation page, in requester ordering.
    pub fn private_page(user_id: i64, other_id: i64, limit: i64, offset: i64) -> String {
        format!("messages:private:{}:{}:{}:{}", user_id, other_id, limit, offset)
    }

    /// Key for one group page.
    pub fn group_page(group_id: i64, limit: i64, offset: i64) -> String {
        format!("messages:group:{}:{}:{}", group_id, limit, offset)
    }

    /// Pattern matching every public feed page.
    pub fn public_pattern() -> &'static str {
        "messages:public:*"
    }

    /// Pattern matching every page of one private pair ordering.
    pub fn private_pattern(user_id: i64, other_id: i64) -> String {
        format!("messages:private:{}:{}:*", user_id, other_id)
    }

    /// Pattern matching every page of one group.
    pub fn group_pattern(group_id: i64) -> String {
        format!("messages:group:{}:*", group_id)
    }
}

/// Scope-aware cache for paginated message reads.
pub struct MessageCacheService<C: Cache> {
    cache: Arc<C>,
    ttl_secs: u64,
}

impl<C: Cache> MessageCacheService<C> {
    pub fn new(cache: Arc<C>, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    /// Fetch a cached page, if present.
    pub async fn get_page(&self, key: &str) -> Result<Option<Vec<Message>>, AppError> {
        self.cache.get(key).await
    }

    /// Store a page under the configured TTL.
    pub async fn store_page(&self, key: &str, page: &[Message]) -> Result<(), AppError> {
        self.cache.set_ex(key, &page, self.ttl_secs).await
    }

    /// Invalidate every cached page the given persisted message could
    /// appear on. Returns the number of keys removed.
    pub async fn invalidate_for(&self, message: &Message) -> Result<u64, AppError> {
        match message.kind {
            MessageKind::Public => self.cache.delete_matching(keys::public_pattern()).await,
            MessageKind::Private => {
                let Some(receiver_id) = message.receiver_id else {
                    return Ok(0);
                };
                // A page may be cached under either participant ordering.
                let a = self
                    .cache
                    .delete_matching(&keys::private_pattern(message.user_id, receiver_id))
                    .await?;
                let b = self
                    .cache
                    .delete_matching(&keys::private_pattern(receiver_id, message.user_id))
                    .await?;
                Ok(a + b)
            }
            MessageKind::Group => match message.group_id {
                Some(group_id) => self.cache.delete_matching(&keys::group_pattern(group_id)).await,
                None => Ok(0),
            },
        }
    }
}
