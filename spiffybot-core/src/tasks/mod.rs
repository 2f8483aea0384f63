// File: spiffybot-core/src/tasks/mod.rs

pub mod announcements;

pub use announcements::{AnnouncementScheduler, TickOutcome};
