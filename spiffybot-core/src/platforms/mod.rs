// File: src/platforms/mod.rs

pub mod twitch_eventsub;
pub mod twitch_helix;
