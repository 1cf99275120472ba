//! Cache Module
//!
//! Redis connection management and the message page cache.
//!
//! This module provides:
//! - Redis connection management with automatic reconnection
//! - A generic `Cache` trait for abstracting cache operations
//! - A `RedisCache` implementation with scan-based pattern invalidation
//! - `MessageCacheService`, the scope-partitioned page cache used by
//!   the delivery pipeline and history reads

mod cache_service;
mod message_cache;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache_service::{Cache, RedisCache};
pub use message_cache::{keys, MessageCacheService};

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
///
/// The connection manager handles connection pooling and automatic
/// reconnection when the connection is lost.
#[instrument(skip(settings), fields(url = %settings.url))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}
