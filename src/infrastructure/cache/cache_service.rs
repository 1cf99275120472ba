//! Cache Service
//!
//! Generic cache trait and Redis implementation for paginated message
//! reads.
//!
//! This module provides:
//! - A `Cache` trait defining the operations the delivery core needs
//! - A `RedisCache` implementation using Redis as the backing store
//! - JSON serialization/deserialization for complex types
//!
//! # Example
//!
//! ```rust,ignore
//! use chat_hub::infrastructure::cache::{Cache, RedisCache};
//!
//! let cache = RedisCache::new(redis_connection);
//!
//! // Store a message page for five minutes
//! cache.set_ex("messages:public:50:0", &page, 300).await?;
//!
//! // Retrieve it
//! let page: Option<Vec<Message>> = cache.get("messages:public:50:0").await?;
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::shared::error::AppError;

/// Generic cache trait for abstracting cache operations.
///
/// Allows different backend implementations (Redis, in-memory for
/// tests). All operations are async and return `Result<T, AppError>`.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Retrieves a value from the cache by key.
    ///
    /// # Returns
    /// * `Ok(Some(T))` - If the key exists and deserialization succeeds
    /// * `Ok(None)` - If the key does not exist
    /// * `Err(AppError)` - If a cache or deserialization error occurs
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, AppError>;

    /// Stores a value in the cache with an expiration time in seconds.
    async fn set_ex<T: Serialize + Sync + Send>(
        &self,
        key: &str,
        value: &T,
        seconds: u64,
    ) -> Result<(), AppError>;

    /// Deletes a key from the cache.
    ///
    /// # Returns
    /// * `Ok(true)` - If the key existed and was deleted
    /// * `Ok(false)` - If the key did not exist
    async fn delete(&self, key: &str) -> Result<bool, AppError>;

    /// Deletes every key matching a glob pattern, returning the number
    /// of keys removed. Backed by an incremental scan so a large
    /// keyspace never blocks the store.
    async fn delete_matching(&self, pattern: &str) -> Result<u64, AppError>;
}

/// Redis-backed cache implementation.
///
/// Uses a Redis ConnectionManager for efficient connection pooling and
/// automatic reconnection handling.
#[derive(Clone)]
pub struct RedisCache {
    /// Redis connection manager with automatic reconnection
    conn: ConnectionManager,
    /// Optional key prefix for namespacing
    prefix: Option<Arc<str>>,
}

impl RedisCache {
    /// Creates a new RedisCache instance.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn, prefix: None }
    }

    /// Creates a new RedisCache instance with a key prefix.
    ///
    /// All keys will be automatically prefixed, useful for running
    /// several deployments against one Redis.
    pub fn with_prefix(conn: ConnectionManager, prefix: impl Into<Arc<str>>) -> Self {
        Self {
            conn,
            prefix: Some(prefix.into()),
        }
    }

    /// Formats a key with the optional prefix.
    fn format_key(&self, key: &str) -> String {
        apply_prefix(self.prefix.as_deref(), key)
    }

    /// Serializes a value to JSON string.
    fn serialize<T: Serialize>(value: &T) -> Result<String, AppError> {
        serde_json::to_string(value).map_err(|e| {
            warn!("Cache serialization error: {}", e);
            AppError::Internal(format!("Cache serialization failed: {}", e))
        })
    }

    /// Deserializes a JSON string to the target type.
    fn deserialize<T: DeserializeOwned>(data: &str) -> Result<T, AppError> {
        serde_json::from_str(data).map_err(|e| {
            warn!("Cache deserialization error: {}", e);
            AppError::Internal(format!("Cache deserialization failed: {}", e))
        })
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[instrument(skip(self), level = "debug")]
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let result: Option<String> = conn.get(&full_key).await?;

        match result {
            Some(data) => {
                debug!(key = %full_key, "Cache hit");
                let value = Self::deserialize(&data)?;
                Ok(Some(value))
            }
            None => {
                debug!(key = %full_key, "Cache miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn set_ex<T: Serialize + Sync + Send>(
        &self,
        key: &str,
        value: &T,
        seconds: u64,
    ) -> Result<(), AppError> {
        let full_key = self.format_key(key);
        let data = Self::serialize(value)?;
        let mut conn = self.conn.clone();

        let _: () = conn.set_ex(&full_key, data, seconds).await?;
        debug!(key = %full_key, ttl = seconds, "Cache set with expiry");

        Ok(())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        let full_key = self.format_key(key);
        let mut conn = self.conn.clone();

        let deleted: u64 = conn.del(&full_key).await?;
        let existed = deleted > 0;

        debug!(key = %full_key, deleted = existed, "Cache delete");

        Ok(existed)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_matching(&self, pattern: &str) -> Result<u64, AppError> {
        let full_pattern = self.format_key(pattern);
        let mut conn = self.conn.clone();

        // SCAN in batches; KEYS would block Redis on a large keyspace.
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&full_pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let count: u64 = conn.del(&keys).await?;
                deleted += count;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern = %full_pattern, deleted = deleted, "Cache delete matching");

        Ok(deleted)
    }
}

fn apply_prefix(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}{}", prefix, key),
        None => key.to_string(),
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}
