// File: spiffybot-common/src/models/helix.rs
//! Records returned by the Helix API, trimmed to the fields the bot reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope shared by most Helix list endpoints.
#[derive(Debug, Deserialize)]
pub struct HelixList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// A live stream. Offline channels have no stream record at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamInfo {
    pub id: String,
    pub user_id: String,
    pub user_login: String,
    pub game_name: String,
    pub title: String,
    pub started_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserIdentity {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

impl UserIdentity {
    pub fn display_or_login(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.login
        } else {
            &self.display_name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelInfo {
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub title: String,
    pub game_id: String,
    pub game_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: i64,
    pub text: String,
}
