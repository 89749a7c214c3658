//! Persistent key-value store adapters
//!
//! The cache engine sits on top of a `KeyValueStore`: a durable string-keyed
//! store holding serialized values. Two adapters are provided, an in-memory
//! store for tests and short-lived runs, and a file-backed store that keeps one
//! JSON file per key in the user's cache directory.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a key-value store adapter
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem access failed
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// An entry file exists under the key's name but cannot be decoded
    #[error("Corrupt store entry {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The entry could not be encoded for writing
    #[error("Failed to encode store entry: {0}")]
    Encode(#[source] serde_json::Error),

    /// The store cannot be used at all (e.g., no cache directory)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A durable string-keyed store
///
/// Implementations serialize their own operations; callers apply no locking
/// across calls, so concurrent writers to the same key are last-writer-wins.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if absent
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Stores `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key in the store, including keys owned by other users
    async fn keys(&self) -> Result<Vec<String>, StoreError>;

    /// Removes every key in the store
    async fn clear(&self) -> Result<(), StoreError>;
}
