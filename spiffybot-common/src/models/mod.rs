// File: spiffybot-common/src/models/mod.rs
pub mod channel;
pub mod command;
pub mod events_config;
pub mod announcements;
pub mod modtools;
pub mod helix;

pub use channel::ChannelIdentity;
pub use command::{CommandDef, CommandFile, CommandKind, Permission, RoleFlags};
pub use events_config::{EventsConfig, MAX_WINDOW};
pub use announcements::{AnnouncementMessage, AnnouncementsConfig, QuietHoursConfig};
pub use modtools::ModToolsConfig;
pub use helix::{ChannelInfo, GameInfo, Quote, StreamInfo, UserIdentity};
