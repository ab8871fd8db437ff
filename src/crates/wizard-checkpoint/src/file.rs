//! File-backed key-value store
//!
//! All keys live in one JSON object document. Writes go to a sibling
//! temporary file first and are renamed over the target, so a crash mid-write
//! leaves the previous document intact.

use crate::{
    error::{CheckpointError, Result},
    traits::KeyValueStore,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// [`KeyValueStore`] persisting to a single JSON file
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileKeyValueStore {
    /// Create a store backed by `path`
    ///
    /// The file and its parent directory are created lazily on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&bytes)? {
            Value::Object(map) => Ok(map),
            other => Err(CheckpointError::Storage(format!(
                "expected a JSON object in {}, found {}",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    async fn save(&self, map: Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(&Value::Object(map))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            warn!(path = %self.path.display(), error = %e, "atomic rename failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "store flushed");
        Ok(())
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(CheckpointError::InvalidKey("key must not be blank".to_string()));
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn put(&self, key: &str, value: Value) -> Result<()> {
        validate_key(key)?;
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        map.insert(key.to_string(), value);
        self.save(map).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(key).is_none() {
            return Ok(false);
        }
        self.save(map).await?;
        Ok(true)
    }
}
