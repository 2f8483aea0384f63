// ================================================================
// File: spiffybot-common/src/error.rs
// ================================================================

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No `session_welcome` arrived before subscriptions were requested.
    #[error("No EventSub session id after waiting {0:?}")]
    NoSession(Duration),

    #[error("EventSub subscription {sub_type} failed => HTTP {status} => {body}")]
    SubscriptionCreate {
        sub_type: String,
        status: u16,
        body: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Command handler '{command}' failed: {message}")]
    Handler { command: String, message: String },

    #[error("Helix error: HTTP {status} => {body}")]
    Helix { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Platform error: {0}")]
    Platform(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

impl Error {
    /// Wraps any displayable failure as a handler error for `command`.
    pub fn handler(command: &str, message: impl std::fmt::Display) -> Self {
        Error::Handler {
            command: command.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
