//! Durable client-side key-value storage.
//!
//! Stores persist their state as JSON under a fixed key, wrapped in
//! [`Persisted`] with a schema version. A payload that fails to parse or
//! carries a different version is discarded and the store starts empty.
//!
//! Storage failures never fail a store operation: they are logged and the
//! in-memory state stays authoritative for the rest of the process.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Storage keys used by the stores.
pub mod keys {
    /// Cart lines.
    pub const CART: &str = "bazaar.cart";
    /// Cached session user.
    pub const SESSION: &str = "bazaar.session";
    /// Notification log.
    pub const NOTIFICATIONS: &str = "bazaar.notifications";
}

/// Errors raised by a [`Storage`] backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// A string key-value store that survives restarts.
///
/// Calls are synchronous and may block. The cart and notification stores
/// call `save` while holding their own lock, so an implementation must not
/// call back into them.
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One JSON file per key inside a data directory.
///
/// Writes go to a temporary file that is then renamed over the target, so a
/// crash mid-write leaves the previous value in place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Use `dir` as the data directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl Storage for FileStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(value.as_bytes())?;
        // Contents must be on disk before the rename makes them visible.
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage, for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether anything is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// On-disk envelope carrying a schema version.
#[derive(Debug, Serialize, Deserialize)]
pub struct Persisted<T> {
    pub version: u32,
    pub data: T,
}

/// Load and decode the value under `key`.
///
/// Returns `None` when nothing is stored, the payload is corrupt, or it was
/// written with a different schema version.
pub fn load_versioned<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
    version: u32,
) -> Option<T> {
    let raw = match storage.load(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted state");
            return None;
        }
    };

    match serde_json::from_str::<Persisted<T>>(&raw) {
        Ok(persisted) if persisted.version == version => Some(persisted.data),
        Ok(persisted) => {
            warn!(
                key,
                found = persisted.version,
                expected = version,
                "Discarding persisted state with unknown schema version"
            );
            None
        }
        Err(e) => {
            warn!(key, error = %e, "Discarding corrupt persisted state");
            None
        }
    }
}

/// Encode and store `value` under `key`. Failures are logged and swallowed.
pub fn save_versioned<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    version: u32,
    value: &T,
) {
    let result = serde_json::to_string(&Persisted {
        version,
        data: value,
    })
    .map_err(StorageError::from)
    .and_then(|json| storage.save(key, &json));

    if let Err(e) = result {
        warn!(key, error = %e, "Failed to persist state");
    }
}

/// Delete `key`. Failures are logged and swallowed.
pub fn remove_logged(storage: &dyn Storage, key: &str) {
    if let Err(e) = storage.remove(key) {
        warn!(key, error = %e, "Failed to remove persisted state");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_versioned_round_trip() {
        let storage = MemoryStorage::new();
        save_versioned(&storage, keys::CART, 1, &vec![1, 2, 3]);

        let loaded: Option<Vec<i32>> = load_versioned(&storage, keys::CART, 1);
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_version_mismatch_is_discarded() {
        let storage = MemoryStorage::new();
        save_versioned(&storage, keys::CART, 1, &vec![1]);

        let loaded: Option<Vec<i32>> = load_versioned(&storage, keys::CART, 2);
        assert!(loaded.is_none());
    }

    #[test]
    fn test_corrupt_payload_is_discarded() {
        let storage = MemoryStorage::new();
        storage.save(keys::CART, "{not json").unwrap();

        let loaded: Option<Vec<i32>> = load_versioned(&storage, keys::CART, 1);
        assert!(loaded.is_none());
    }

    #[test]
    fn test_file_storage_round_trip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("data")).unwrap();

        assert!(storage.load(keys::SESSION).unwrap().is_none());
        storage.save(keys::SESSION, r#"{"a":1}"#).unwrap();
        assert_eq!(
            storage.load(keys::SESSION).unwrap().as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert!(storage.dir().join("bazaar.session.json").exists());
        assert!(!storage.dir().join("bazaar.session.json.tmp").exists());

        storage.remove(keys::SESSION).unwrap();
        storage.remove(keys::SESSION).unwrap();
        assert!(storage.load(keys::SESSION).unwrap().is_none());
    }

    #[test]
    fn test_file_storage_overwrite_replaces_whole_value() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();
        // Left behind by an interrupted write.
        fs::write(dir.path().join("bazaar.cart.json.tmp"), "garbage that is long").unwrap();

        storage.save(keys::CART, r#"{"lines":[1,2,3]}"#).unwrap();
        storage.save(keys::CART, "[]").unwrap();

        assert_eq!(storage.load(keys::CART).unwrap().as_deref(), Some("[]"));
        assert!(!dir.path().join("bazaar.cart.json.tmp").exists());
    }

    #[test]
    fn test_file_storage_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path()).unwrap();

        assert!(matches!(
            storage.save("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.load(""),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
