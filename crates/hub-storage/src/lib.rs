//! Storage abstraction for JSON persistence
//!
//! Every persisted collection lives in its own pretty-printed JSON file in
//! one storage directory (`rules.json`, `schedule.json`, ...). A file that
//! does not exist yet is not an error: callers start from an empty state.

use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// File holding the rule definitions
pub const RULES_FILE: &str = "rules.json";
/// File holding the scheduled tasks
pub const SCHEDULE_FILE: &str = "schedule.json";
/// File holding the saved device-state snapshots
pub const SAVED_STATE_FILE: &str = "savedstate.json";
/// File holding notification destinations
pub const DESTINATIONS_FILE: &str = "destinations.json";
/// File holding persons
pub const PERSONS_FILE: &str = "persons.json";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage manager for one directory of JSON files
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Create a new storage manager rooted at `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Get the storage directory path
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the full path of a storage file
    pub fn file_path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    /// Check if a storage file exists
    pub fn exists(&self, file: &str) -> bool {
        self.file_path(file).exists()
    }

    /// Load a file
    ///
    /// Returns None if the file doesn't exist.
    pub async fn load<T>(&self, file: &str) -> StorageResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let path = self.file_path(file);

        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Storage file not found: {}", path.display());
                return Ok(None);
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        let data = serde_json::from_str(&content).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;

        debug!("Loaded storage file: {}", path.display());
        Ok(Some(data))
    }

    /// Save a file
    ///
    /// Writes atomically by first writing to a temp file, then renaming.
    pub async fn save<T>(&self, file: &str, data: &T) -> StorageResult<()>
    where
        T: Serialize + ?Sized,
    {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.file_path(file);
        let temp_path = self.file_path(&format!("{}.tmp", file));

        let content = serde_json::to_string_pretty(data).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;

        fs::write(&temp_path, &content)
            .await
            .map_err(|source| StorageError::Io {
                path: temp_path.clone(),
                source,
            })?;

        fs::rename(&temp_path, &path)
            .await
            .map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;

        debug!("Saved storage file: {}", path.display());
        Ok(())
    }

    /// Delete a storage file
    pub async fn delete(&self, file: &str) -> StorageResult<()> {
        let path = self.file_path(file);

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted storage file: {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }
}
