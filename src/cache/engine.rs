//! Cache engine with TTL expiry and LRU eviction
//!
//! Provides a `CacheEngine` that stores serializable values in a
//! `KeyValueStore` wrapped in an envelope carrying an expiry timestamp and a
//! last-access timestamp. Every storage key is prefixed with a namespace so the
//! cache can share a store with unrelated data and enumerate only its own
//! entries.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{KeyValueStore, StoreError};

/// Prefix applied to every key the cache writes
pub const CACHE_NAMESPACE: &str = "sea-here-cache:";

/// Errors that can occur when using the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// The underlying store failed
    #[error("Cache store failed: {0}")]
    Store(#[from] StoreError),

    /// The value could not be serialized into an entry
    #[error("Failed to serialize cache entry: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A stored entry could not be decoded as the requested type
    #[error("Corrupt cache entry '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The TTL cannot be represented as a wall-clock offset
    #[error("TTL out of range: {0:?}")]
    InvalidTtl(Duration),
}

/// Envelope persisted for every cache entry
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// The cached value
    value: T,
    /// After this instant the entry is logically absent
    expires_at: DateTime<Utc>,
    /// Last time the entry was written or read
    last_access: DateTime<Utc>,
}

/// Timestamps of an entry, decoded without touching its value
#[derive(Debug, Deserialize)]
struct EntryTimestamps {
    expires_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
}

/// Outcome of a cache read
///
/// Separates "legitimately absent" from "the store is broken" so callers do
/// not have to infer it from logs.
#[derive(Debug)]
pub enum CacheLookup<T> {
    /// A live entry was found
    Hit(T),
    /// No live entry exists (never written, expired, or evicted)
    Miss,
    /// The store failed or the entry could not be decoded
    Failed(CacheError),
}

impl<T> CacheLookup<T> {
    /// Returns the value on a hit, treating failures as misses
    pub fn hit(self) -> Option<T> {
        match self {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss | CacheLookup::Failed(_) => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    pub fn is_miss(&self) -> bool {
        matches!(self, CacheLookup::Miss)
    }
}

/// Entry counts reported by [`CacheEngine::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// All namespaced entries
    pub total: usize,
    /// Entries that have not expired
    pub valid: usize,
    /// Entries past their expiry (or undecodable) that have not been purged yet
    pub expired: usize,
}

/// What an eviction pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Expired or undecodable entries purged along the way
    pub expired: usize,
    /// Live entries evicted to get under the limit
    pub evicted: usize,
}

/// Namespaced TTL cache over a shared key-value store
///
/// The engine applies no locking of its own: concurrent writes to the same key
/// are last-writer-wins, and an eviction pass racing with writes may keep or
/// drop the new entries.
#[derive(Clone)]
pub struct CacheEngine {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
}

impl std::fmt::Debug for CacheEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEngine")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl CacheEngine {
    /// Creates a cache using the default `sea-here-cache:` namespace
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_namespace(store, CACHE_NAMESPACE)
    }

    /// Creates a cache with a custom namespace prefix
    pub fn with_namespace(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.namespace, key)
    }

    async fn namespaced_keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|key| key.starts_with(&self.namespace))
            .collect())
    }

    /// Reads a value from the cache
    ///
    /// An expired entry is deleted and reported as a miss. A live entry has its
    /// last-access timestamp refreshed before the value is returned. Store
    /// failures come back as [`CacheLookup::Failed`], never as a panic.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CacheLookup<T> {
        let storage_key = self.storage_key(key);

        let raw = match self.store.get(&storage_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                return CacheLookup::Failed(e.into());
            }
        };

        let mut entry: CacheEntry<Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(source) => {
                warn!(key, error = %source, "Cache entry is not a valid envelope");
                return CacheLookup::Failed(CacheError::Corrupt {
                    key: key.to_string(),
                    source,
                });
            }
        };

        let now = Utc::now();
        if now > entry.expires_at {
            debug!(key, "Cache entry expired, removing");
            if let Err(e) = self.store.delete(&storage_key).await {
                warn!(key, error = %e, "Failed to remove expired cache entry");
            }
            return CacheLookup::Miss;
        }

        let value = match T::deserialize(&entry.value) {
            Ok(value) => value,
            Err(source) => {
                warn!(key, error = %source, "Cache entry does not match the requested type");
                return CacheLookup::Failed(CacheError::Corrupt {
                    key: key.to_string(),
                    source,
                });
            }
        };

        entry.last_access = now;
        match serde_json::to_string(&entry) {
            Ok(raw) => {
                if let Err(e) = self.store.set(&storage_key, raw).await {
                    warn!(key, error = %e, "Failed to record cache access");
                }
            }
            Err(e) => warn!(key, error = %e, "Failed to re-encode cache entry"),
        }

        CacheLookup::Hit(value)
    }

    /// Writes a value to the cache with the given time-to-live
    ///
    /// Unlike [`get`](Self::get), failures are returned to the caller.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Utc::now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(CacheError::InvalidTtl(ttl))?;

        let entry = CacheEntry {
            value,
            expires_at,
            last_access: now,
        };
        let raw = serde_json::to_string(&entry).map_err(CacheError::Serialize)?;

        self.store.set(&self.storage_key(key), raw).await?;
        Ok(())
    }

    /// Removes a single entry
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.delete(&self.storage_key(key)).await?;
        Ok(())
    }

    /// Evicts least-recently-used entries until at most `max_entries` live entries remain
    ///
    /// Expired entries found along the way are deleted and do not count
    /// towards the limit. This never runs implicitly; callers invoke it as a
    /// maintenance step.
    pub async fn evict_lru_if_needed(&self, max_entries: usize) -> Result<EvictionReport, CacheError> {
        let now = Utc::now();
        let mut report = EvictionReport::default();
        let mut live: Vec<(String, DateTime<Utc>)> = Vec::new();

        for storage_key in self.namespaced_keys().await? {
            let Some(raw) = self.store.get(&storage_key).await? else {
                continue;
            };
            match serde_json::from_str::<EntryTimestamps>(&raw) {
                Ok(timestamps) if now <= timestamps.expires_at => {
                    live.push((storage_key, timestamps.last_access));
                }
                _ => {
                    self.store.delete(&storage_key).await?;
                    report.expired += 1;
                }
            }
        }

        if live.len() > max_entries {
            live.sort_by_key(|(_, last_access)| *last_access);
            let excess = live.len() - max_entries;
            for (storage_key, _) in live.into_iter().take(excess) {
                self.store.delete(&storage_key).await?;
                report.evicted += 1;
            }
        }

        debug!(
            expired = report.expired,
            evicted = report.evicted,
            max_entries,
            "Cache eviction pass finished"
        );
        Ok(report)
    }

    /// Deletes every namespaced entry, returning how many were removed
    ///
    /// Keys outside the namespace are left untouched.
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let keys = self.namespaced_keys().await?;
        for storage_key in &keys {
            self.store.delete(storage_key).await?;
        }
        Ok(keys.len())
    }

    /// Counts namespaced entries, split into valid and expired, without deleting anything
    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = Utc::now();
        let mut stats = CacheStats::default();

        for storage_key in self.namespaced_keys().await? {
            let Some(raw) = self.store.get(&storage_key).await? else {
                continue;
            };
            stats.total += 1;
            match serde_json::from_str::<EntryTimestamps>(&raw) {
                Ok(timestamps) if now <= timestamps.expires_at => stats.valid += 1,
                _ => stats.expired += 1,
            }
        }

        Ok(stats)
    }
}
