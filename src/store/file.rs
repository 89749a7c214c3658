//! File-backed key-value store
//!
//! Stores each key as its own JSON file in an XDG-compliant cache directory
//! (`~/.cache/seahere/` on Linux). File names are the SHA-256 of the key, so
//! keys of any length map to short, safe names. Each file records the original
//! key next to the value, which is how `keys()` lists them back. Files in the
//! directory that were not written by this store are ignored.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::warn;

use super::{KeyValueStore, StoreError};

const FILE_EXTENSION: &str = "json";

/// On-disk form of one entry
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    value: String,
}

/// Key-value store persisting one file per key
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Directory where entry files are stored
    dir: PathBuf,
}

impl FileStore {
    /// Creates a FileStore in the XDG cache directory
    ///
    /// Returns `None` if the cache directory cannot be determined (e.g., no home directory).
    pub fn new() -> Option<Self> {
        let project_dirs = ProjectDirs::from("", "", "seahere")?;
        Some(Self {
            dir: project_dirs.cache_dir().to_path_buf(),
        })
    }

    /// Creates a FileStore rooted at a custom directory
    pub fn with_dir(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Directory holding the entry files
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Fixed-length file name for a key
    fn file_name(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{}.{}", hex::encode(hasher.finalize()), FILE_EXTENSION)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(Self::file_name(key))
    }

    /// Lists the `.json` files currently in the directory
    async fn json_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut read_dir = match fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(FILE_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Reads the key recorded in `path`, or `None` if the file is not one of ours
    async fn owned_key(path: &Path) -> Option<String> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable file in cache directory");
                return None;
            }
        };

        let entry: StoredEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(_) => {
                warn!(path = %path.display(), "Skipping foreign file in cache directory");
                return None;
            }
        };

        let expected = Self::file_name(&entry.key);
        if path.file_name().and_then(|name| name.to_str()) != Some(expected.as_str()) {
            warn!(path = %path.display(), "Skipping file whose name does not match its key");
            return None;
        }
        Some(entry.key)
    }

    /// Entry files written by this store, with their keys
    async fn owned_entries(&self) -> Result<Vec<(PathBuf, String)>, StoreError> {
        let mut entries = Vec::new();
        for path in self.json_files().await? {
            if let Some(key) = Self::owned_key(&path).await {
                entries.push((path, key));
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: StoredEntry =
            serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.display().to_string(),
                source,
            })?;
        Ok((entry.key == key).then_some(entry.value))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let entry = StoredEntry {
            key: key.to_string(),
            value,
        };
        let content = serde_json::to_string(&entry).map_err(StoreError::Encode)?;

        fs::create_dir_all(&self.dir).await?;
        fs::write(self.entry_path(key), content).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .owned_entries()
            .await?
            .into_iter()
            .map(|(_, key)| key)
            .collect())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        for (path, _) in self.owned_entries().await? {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
