// File: spiffybot-common/src/models/announcements.rs

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::models::events_config::secs_with_floor;

/// Timed promotional messages (`announcements.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnouncementsConfig {
    pub enabled: bool,
    pub online_only: bool,
    pub min_gap_minutes: f64,
    pub quiet_hours: Option<QuietHoursConfig>,
    pub activity: ActivityConfig,
    pub messages: Vec<AnnouncementMessage>,
}

impl Default for AnnouncementsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            online_only: true,
            min_gap_minutes: 30.0,
            quiet_hours: None,
            activity: ActivityConfig::default(),
            messages: Vec::new(),
        }
    }
}

impl AnnouncementsConfig {
    /// What the bot runs with when no announcements file exists.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn min_gap(&self) -> Duration {
        minutes_with_floor(self.min_gap_minutes, 0.1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActivityConfig {
    pub enabled: bool,
    pub no_chat_minutes: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            no_chat_minutes: 10.0,
        }
    }
}

impl ActivityConfig {
    pub fn no_chat_window(&self) -> Duration {
        minutes_with_floor(self.no_chat_minutes, 1.0)
    }
}

/// `start`/`end` are "HH:mm" wall-clock times in `timezone` (IANA id).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuietHoursConfig {
    pub start: String,
    pub end: String,
    pub timezone: String,
}

impl Default for QuietHoursConfig {
    fn default() -> Self {
        Self {
            start: "00:00".to_string(),
            end: "08:00".to_string(),
            timezone: "Europe/London".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnnouncementMessage {
    pub text: String,
    pub min_interval_minutes: f64,
    pub weight: i64,
}

impl Default for AnnouncementMessage {
    fn default() -> Self {
        Self {
            text: String::new(),
            min_interval_minutes: 30.0,
            weight: 1,
        }
    }
}

impl AnnouncementMessage {
    pub fn min_interval(&self) -> Duration {
        minutes_with_floor(self.min_interval_minutes, 0.1)
    }

    /// Weights below 1 count as 1.
    pub fn effective_weight(&self) -> u64 {
        self.weight.max(1) as u64
    }
}

fn minutes_with_floor(minutes: f64, floor: f64) -> Duration {
    secs_with_floor(minutes * 60.0, floor * 60.0)
}
