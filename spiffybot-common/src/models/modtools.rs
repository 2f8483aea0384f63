use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::events_config::window_secs;

/// Settings for moderator-only setters (`modtools.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModToolsConfig {
    pub cooldowns: ModCooldownsConfig,
    pub sanitization: SanitizationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModCooldownsConfig {
    pub game_change_seconds: u64,
    pub title_change_seconds: u64,
}

impl Default for ModCooldownsConfig {
    fn default() -> Self {
        Self {
            game_change_seconds: 5,
            title_change_seconds: 5,
        }
    }
}

impl ModCooldownsConfig {
    pub fn game_change(&self) -> Duration {
        window_secs(self.game_change_seconds)
    }

    pub fn title_change(&self) -> Duration {
        window_secs(self.title_change_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SanitizationConfig {
    pub collapse_whitespace: bool,
    pub strip_control_chars: bool,
    pub trim: bool,
}

impl Default for SanitizationConfig {
    fn default() -> Self {
        Self {
            collapse_whitespace: true,
            strip_control_chars: true,
            trim: true,
        }
    }
}
