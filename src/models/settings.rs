use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    #[default]
    Classical,
    Modern,
    Friend,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_audio_enabled")]
    pub is_audio_enabled: bool,
    #[serde(default)]
    pub audio_mode: AudioMode,
}

fn default_audio_enabled() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            is_audio_enabled: true,
            audio_mode: AudioMode::Classical,
        }
    }
}
