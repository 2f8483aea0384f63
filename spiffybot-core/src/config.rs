// File: spiffybot-core/src/config.rs
//! Loads the bot's JSON policy files from one directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use spiffybot_common::models::{AnnouncementsConfig, CommandFile, EventsConfig, ModToolsConfig};

use crate::Error;

pub const COMMANDS_FILE: &str = "commands.json";
pub const EVENTS_FILE: &str = "events.json";
pub const ANNOUNCEMENTS_FILE: &str = "announcements.json";
pub const MODTOOLS_FILE: &str = "modtools.json";

/// Everything read from a config directory in one go.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub commands: CommandFile,
    pub events: EventsConfig,
    pub announcements: AnnouncementsConfig,
    pub modtools: ModToolsConfig,
}

#[derive(Debug, Clone)]
pub struct ConfigDir {
    root: PathBuf,
}

impl ConfigDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub async fn load_commands(&self) -> Result<CommandFile, Error> {
        Ok(self.read_json(COMMANDS_FILE).await?.unwrap_or_default())
    }

    pub async fn load_events(&self) -> Result<EventsConfig, Error> {
        Ok(self.read_json(EVENTS_FILE).await?.unwrap_or_default())
    }

    /// A missing file turns announcements off rather than running the defaults.
    pub async fn load_announcements(&self) -> Result<AnnouncementsConfig, Error> {
        let mut cfg = self
            .read_json::<AnnouncementsConfig>(ANNOUNCEMENTS_FILE)
            .await?
            .unwrap_or_else(AnnouncementsConfig::disabled);
        for msg in &mut cfg.messages {
            msg.weight = msg.weight.max(1);
        }
        Ok(cfg)
    }

    pub async fn load_modtools(&self) -> Result<ModToolsConfig, Error> {
        Ok(self.read_json(MODTOOLS_FILE).await?.unwrap_or_default())
    }

    pub async fn load_all(&self) -> Result<BotConfig, Error> {
        let cfg = BotConfig {
            commands: self.load_commands().await?,
            events: self.load_events().await?,
            announcements: self.load_announcements().await?,
            modtools: self.load_modtools().await?,
        };
        info!(
            "Loaded config from {}: {} command(s), {} announcement(s)",
            self.root.display(),
            cfg.commands.commands.len(),
            cfg.announcements.messages.len()
        );
        Ok(cfg)
    }

    /// `Ok(None)` when the file does not exist.
    async fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        let path = self.root.join(name);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not found, using defaults", path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}
