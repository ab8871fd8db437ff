//! Durable record of an in-progress registration

use crate::error::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use wizard_checkpoint::KeyValueStore;

/// Remembers the key of a Registration execution across full reloads
///
/// Written when the user advances past a step, cleared on the terminal
/// submission. Only Registration wizards use it.
#[derive(Clone)]
pub struct ResumableKeyMarker {
    store: Arc<dyn KeyValueStore>,
    slot: String,
}

impl ResumableKeyMarker {
    pub fn new(store: Arc<dyn KeyValueStore>, slot: impl Into<String>) -> Self {
        Self {
            store,
            slot: slot.into(),
        }
    }

    /// Key of the in-progress registration, if any
    pub async fn get(&self) -> Result<Option<String>> {
        Ok(match self.store.get(&self.slot).await? {
            Some(Value::String(key)) if !key.is_empty() => Some(key),
            _ => None,
        })
    }

    pub async fn set(&self, key: &str) -> Result<()> {
        debug!(key = %key, "remembering resumable registration");
        self.store.put(&self.slot, Value::String(key.to_string())).await?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if self.store.delete(&self.slot).await? {
            debug!("cleared resumable registration");
        }
        Ok(())
    }
}
