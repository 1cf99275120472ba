//! In-memory `Cache` doubles for unit tests.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use crate::shared::error::AppError;

use super::Cache;

/// In-memory cache storing serialized values. TTLs are ignored.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>, AppError> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(data) => Ok(Some(
                serde_json::from_str(data).map_err(|e| AppError::Internal(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    async fn set_ex<T: Serialize + Sync + Send>(
        &self,
        key: &str,
        value: &T,
        _seconds: u64,
    ) -> Result<(), AppError> {
        let data = serde_json::to_string(value).map_err(|e| AppError::Internal(e.to_string()))?;
        self.entries.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, AppError> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, AppError> {
        // Patterns used by the message cache always end in `:*`
        let prefix = pattern.trim_end_matches('*');
        let mut entries = self.entries.lock().await;
        let keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &keys {
            entries.remove(key);
        }
        Ok(keys.len() as u64)
    }
}

/// Cache double whose every operation fails, for testing that cache
/// faults stay non-fatal.
#[derive(Default)]
pub struct FailingCache;

#[async_trait]
impl Cache for FailingCache {
    async fn get<T: DeserializeOwned + Send>(&self, _key: &str) -> Result<Option<T>, AppError> {
        Err(AppError::Internal("cache down".into()))
    }

    async fn set_ex<T: Serialize + Sync + Send>(
        &self,
        _key: &str,
        _value: &T,
        _seconds: u64,
    ) -> Result<(), AppError> {
        Err(AppError::Internal("cache down".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, AppError> {
        Err(AppError::Internal("cache down".into()))
    }

    async fn delete_matching(&self, _pattern: &str) -> Result<u64, AppError> {
        Err(AppError::Internal("cache down".into()))
    }
}
