//! Durable key-value storage abstraction
//!
//! The wizard driver keeps exactly one piece of state across full reloads: the
//! resumable-key marker of an in-progress registration. [`KeyValueStore`] is
//! the small contract it needs from whatever durable medium the host offers
//! (browser-like local storage, a file, a database row).

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Durable key-value store
///
/// Implementations must make a `put` visible to a `get` issued by a later
/// process using the same backing medium.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value by key, replacing any previous value
    async fn put(&self, key: &str, value: Value) -> Result<()>;

    /// Delete a value by key
    ///
    /// # Returns
    ///
    /// true if the key existed and was deleted, false otherwise
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Check if a key exists
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
