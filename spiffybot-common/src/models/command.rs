use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::events_config::window_secs;

/// Role tiers, ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Permission {
    #[default]
    Everyone,
    Subscriber,
    Vip,
    Mod,
    Broadcaster,
}

impl Permission {
    /// Unknown or empty strings fall back to `Everyone`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "broadcaster" => Permission::Broadcaster,
            "mod" | "moderator" => Permission::Mod,
            "vip" => Permission::Vip,
            "sub" | "subscriber" => Permission::Subscriber,
            _ => Permission::Everyone,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Everyone => "everyone",
            Permission::Subscriber => "subscriber",
            Permission::Vip => "vip",
            Permission::Mod => "mod",
            Permission::Broadcaster => "broadcaster",
        }
    }
}

impl From<String> for Permission {
    fn from(s: String) -> Self {
        Permission::parse(&s)
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        p.as_str().to_string()
    }
}

/// Role flags carried by a chat message. Flags are independent and may co-occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RoleFlags {
    pub broadcaster: bool,
    pub moderator: bool,
    pub vip: bool,
    pub subscriber: bool,
}

impl RoleFlags {
    pub fn highest_tier(&self) -> Permission {
        if self.broadcaster {
            Permission::Broadcaster
        } else if self.moderator {
            Permission::Mod
        } else if self.vip {
            Permission::Vip
        } else if self.subscriber {
            Permission::Subscriber
        } else {
            Permission::Everyone
        }
    }

    pub fn satisfies(&self, required: Permission) -> bool {
        self.highest_tier() >= required
    }

    pub fn is_mod_or_broadcaster(&self) -> bool {
        self.moderator || self.broadcaster
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandKind {
    /// Replies with `data.text`.
    #[default]
    Static,
    /// Dispatched by name to a built-in handler.
    Dynamic,
}

impl From<String> for CommandKind {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("dynamic") {
            CommandKind::Dynamic
        } else {
            CommandKind::Static
        }
    }
}

impl From<CommandKind> for String {
    fn from(k: CommandKind) -> Self {
        match k {
            CommandKind::Static => "static".to_string(),
            CommandKind::Dynamic => "dynamic".to_string(),
        }
    }
}

/// One configured chat command. Cooldowns are in seconds, 0 = none.
/// Usage caps count invocations per live stream, 0 = unlimited.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CommandKind,
    pub aliases: Vec<String>,
    pub permission: Permission,
    pub global_cooldown: u64,
    pub user_cooldown: u64,
    pub global_usage: u32,
    pub user_usage: u32,
    pub reply_to_user: bool,
    pub data: serde_json::Value,
}

impl CommandDef {
    /// `data.<key>` as a string, if present.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    pub fn global_cooldown_window(&self) -> Duration {
        window_secs(self.global_cooldown)
    }

    pub fn user_cooldown_window(&self) -> Duration {
        window_secs(self.user_cooldown)
    }
}

/// Contents of `commands.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommandFile {
    pub prefix: String,
    pub commands: Vec<CommandDef>,
}

impl Default for CommandFile {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            commands: Vec::new(),
        }
    }
}
