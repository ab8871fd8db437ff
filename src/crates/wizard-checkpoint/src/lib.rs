//! State that outlives a single wizard request
//!
//! Two concerns live here:
//!
//! - [`ExecutionCache`]: a process-lifetime, consume-once map from execution
//!   key to the last state seen before navigating away.
//! - [`KeyValueStore`]: a durable store used for the resumable-key marker,
//!   with [`InMemoryKeyValueStore`] and [`FileKeyValueStore`] backends.
//!
//! # Example
//!
//! ```rust
//! use wizard_checkpoint::{InMemoryKeyValueStore, KeyValueStore};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> wizard_checkpoint::Result<()> {
//! let store = InMemoryKeyValueStore::new();
//! store.put("wizard.registration", json!("exec-1")).await?;
//! assert_eq!(store.get("wizard.registration").await?, Some(json!("exec-1")));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use cache::ExecutionCache;
pub use error::{CheckpointError, Result};
pub use file::FileKeyValueStore;
pub use memory::InMemoryKeyValueStore;
pub use traits::KeyValueStore;
