//! In-memory key-value store
//!
//! Not durable across processes; used in tests and by hosts that provide
//! their own persistence around the driver.

use crate::{error::Result, traits::KeyValueStore};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory implementation of [`KeyValueStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryKeyValueStore {
    data: Arc<RwLock<HashMap<String, Value>>>,
}

impl InMemoryKeyValueStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of keys in the store
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        self.data.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.data.write().await.remove(key).is_some())
    }
}
