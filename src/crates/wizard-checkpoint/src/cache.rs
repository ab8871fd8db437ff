//! Process-lifetime cache bridging a navigation away and back
//!
//! [`ExecutionCache`] holds the last state received for an execution right
//! before the presentation layer leaves the page (identity provider login,
//! external payment). When the user comes back, the state is read **once**:
//! [`ExecutionCache::take`] removes the entry, so a second resume of the same
//! key falls through to whatever the caller does on a miss (a network fetch).
//!
//! # Lifecycle
//!
//! ```text
//!   store(K, S)          take(K)            take(K)
//! ─────────────▶ [K → S] ────────▶ Some(S) ────────▶ None
//! ```
//!
//! The cache is not durable: it lives as long as the process. Entries carry
//! the time they were stored so long-abandoned ones can be purged.
//!
//! # Example
//!
//! ```rust
//! use wizard_checkpoint::ExecutionCache;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let cache: ExecutionCache<String> = ExecutionCache::new();
//! cache.store("exec-1", "state".to_string()).await;
//!
//! assert_eq!(cache.take("exec-1").await.as_deref(), Some("state"));
//! assert!(cache.take("exec-1").await.is_none());
//! # }
//! ```

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Storage entry for cached executions
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

type CacheStorage<T> = Arc<RwLock<HashMap<String, CacheEntry<T>>>>;

/// Consume-once cache keyed by execution key
///
/// Cloning is shallow: clones share the same entries.
#[derive(Debug, Clone)]
pub struct ExecutionCache<T> {
    storage: CacheStorage<T>,
}

impl<T: Clone + Send + Sync> ExecutionCache<T> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store a value, replacing any unconsumed entry for the same key
    pub async fn store(&self, key: impl Into<String>, value: T) {
        let key = key.into();
        let mut storage = self.storage.write().await;
        if storage
            .insert(
                key.clone(),
                CacheEntry {
                    value,
                    stored_at: Utc::now(),
                },
            )
            .is_some()
        {
            debug!(key = %key, "replaced unconsumed cache entry");
        }
    }

    /// Remove and return the value for a key
    pub async fn take(&self, key: &str) -> Option<T> {
        self.storage.write().await.remove(key).map(|e| e.value)
    }

    /// Whether an unconsumed entry exists, without consuming it
    pub async fn contains(&self, key: &str) -> bool {
        self.storage.read().await.contains_key(key)
    }

    /// When the entry for a key was stored
    pub async fn stored_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.storage.read().await.get(key).map(|e| e.stored_at)
    }

    /// Drop entries stored longer ago than `max_age`, returning how many were dropped
    pub async fn purge_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut storage = self.storage.write().await;
        let before = storage.len();
        storage.retain(|_, entry| entry.stored_at >= cutoff);
        before - storage.len()
    }

    /// Number of unconsumed entries
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Whether the cache holds nothing
    pub async fn is_empty(&self) -> bool {
        self.storage.read().await.is_empty()
    }

    /// Clear all entries (useful for testing)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

impl<T: Clone + Send + Sync> Default for ExecutionCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
