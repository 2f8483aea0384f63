// File: spiffybot-core/src/services/twitch/mod.rs

pub mod builtin_commands;
pub mod command_service;
pub mod event_announcer;

pub use command_service::{CommandDispatcher, CommandRejection, DispatchOutcome};
pub use event_announcer::{AnnounceOutcome, EventAnnouncer, Suppression};
