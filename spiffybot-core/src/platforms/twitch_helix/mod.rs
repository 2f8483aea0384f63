// File: src/platforms/twitch_helix/mod.rs

pub mod auth;
pub mod client;

pub use auth::{AppTokenProvider, StoredToken, UserTokenAuth};
pub use client::HelixClient;
