use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::settings::{AudioMode, Settings};
use crate::store::local::{load_json, save_json, LocalStorage, StorageError, SETTINGS_STORAGE_KEY};

pub struct SettingsStore {
    storage: Arc<dyn LocalStorage>,
    settings: RwLock<Settings>,
}

impl SettingsStore {
    pub fn new(storage: Arc<dyn LocalStorage>) -> Self {
        let settings: Settings = load_json(storage.as_ref(), SETTINGS_STORAGE_KEY);
        Self {
            storage,
            settings: RwLock::new(settings),
        }
    }

    pub async fn get(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn toggle_audio(&self) -> Result<Settings, StorageError> {
        let mut settings = self.settings.write().await;
        let next = Settings {
            is_audio_enabled: !settings.is_audio_enabled,
            ..settings.clone()
        };
        save_json(self.storage.as_ref(), SETTINGS_STORAGE_KEY, &next)?;
        tracing::debug!(enabled = next.is_audio_enabled, "Audio toggled");
        *settings = next.clone();
        Ok(next)
    }

    pub async fn set_audio_mode(&self, mode: AudioMode) -> Result<Settings, StorageError> {
        let mut settings = self.settings.write().await;
        let next = Settings {
            audio_mode: mode,
            ..settings.clone()
        };
        save_json(self.storage.as_ref(), SETTINGS_STORAGE_KEY, &next)?;
        *settings = next.clone();
        Ok(next)
    }
}
