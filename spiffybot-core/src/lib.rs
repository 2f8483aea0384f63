// src/lib.rs

pub mod config;
pub mod platforms;
pub mod services;
pub mod tasks;
pub mod utils;

pub use spiffybot_common::error::Error;
