// File: spiffybot-core/src/services/mod.rs

pub mod twitch;

pub use twitch::{CommandDispatcher, EventAnnouncer};
