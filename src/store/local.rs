//! Local key-value persistence. Each key holds one JSON blob, the way a
//! browser `localStorage` namespace would.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

pub const MOOD_STORAGE_KEY: &str = "mood-observer-storage";
pub const SETTINGS_STORAGE_KEY: &str = "mood-observer-settings";
pub const REPORTS_STORAGE_KEY: &str = "mood-observer-reports";
pub const IDENTITY_STORAGE_KEY: &str = "mood_user_email";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

pub trait LocalStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key under a data directory. Writes go to a temp file first
/// and are renamed into place.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl LocalStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub use memory::{FailingStorage, MemoryStorage};


/// Hydrate a blob, falling back to its default when missing or unreadable.
/// A corrupt blob is logged and replaced on the next flush.
pub fn load_json<T>(storage: &dyn LocalStorage, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    match storage.get(key) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(key = key, error = %e, "Discarding unreadable local blob");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            tracing::warn!(key = key, error = %e, "Local storage read failed");
            T::default()
        }
    }
}

pub fn save_json<T: Serialize>(
    storage: &dyn LocalStorage,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::settings::{AudioMode, Settings};

    #[test]
    fn test_file_storage_roundtrip_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path().join("nested")).unwrap();

        assert_eq!(storage.get(MOOD_STORAGE_KEY).unwrap(), None);
        storage.set(MOOD_STORAGE_KEY, "{\"records\":[]}").unwrap();
        assert_eq!(
            storage.get(MOOD_STORAGE_KEY).unwrap().as_deref(),
            Some("{\"records\":[]}")
        );
        assert!(storage.dir().join("mood-observer-storage.json").exists());

        storage.remove(MOOD_STORAGE_KEY).unwrap();
        assert_eq!(storage.get(MOOD_STORAGE_KEY).unwrap(), None);
        // Removing twice is fine
        storage.remove(MOOD_STORAGE_KEY).unwrap();
    }

    #[test]
    fn test_file_storage_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert!(matches!(
            storage.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(storage.get(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_load_json_falls_back_on_corrupt_blob() {
        let storage = MemoryStorage::new();
        storage.set(SETTINGS_STORAGE_KEY, "not json").unwrap();
        let settings: Settings = load_json(&storage, SETTINGS_STORAGE_KEY);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let storage = MemoryStorage::new();
        let settings = Settings {
            is_audio_enabled: false,
            audio_mode: AudioMode::Friend,
        };
        save_json(&storage, SETTINGS_STORAGE_KEY, &settings).unwrap();
        let loaded: Settings = load_json(&storage, SETTINGS_STORAGE_KEY);
        assert_eq!(loaded, settings);
    }
}
