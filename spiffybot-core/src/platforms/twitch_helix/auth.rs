// File: spiffybot-core/src/platforms/twitch_helix/auth.rs
//
// Token helpers: a refreshable user token (broadcaster or bot account) and an
// app token from the client-credentials grant. Both refresh when the token is
// missing or within REFRESH_MARGIN_SECS of expiring.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use spiffybot_common::traits::TokenProvider;

use crate::Error;

pub const DEFAULT_TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const REFRESH_MARGIN_SECS: i64 = 300;

/// On-disk shape of a user token file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            _ if self.access_token.is_empty() => true,
            Some(exp) => exp - now <= Duration::seconds(REFRESH_MARGIN_SECS),
            None => true,
        }
    }
}

/// Matches Twitch's JSON from the token endpoint
#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

async fn post_token_form(
    http: &ReqwestClient,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<TwitchTokenResponse, Error> {
    let resp = http.post(token_url).form(form).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Auth(format!("token endpoint returned HTTP {status}: {body}")));
    }
    Ok(resp.json::<TwitchTokenResponse>().await?)
}

/// A user access token that is refreshed with its refresh token and written
/// back to `path` (when set) after every refresh.
pub struct UserTokenAuth {
    client_id: String,
    client_secret: String,
    token_url: String,
    path: Option<PathBuf>,
    http: ReqwestClient,
    token: Mutex<StoredToken>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl UserTokenAuth {
    pub fn new(client_id: &str, client_secret: &str, token: StoredToken) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            path: None,
            http: ReqwestClient::new(),
            token: Mutex::new(token),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Reads a token file written by an earlier run (or by hand).
    pub fn load(client_id: &str, client_secret: &str, path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Auth(format!("cannot read token file {}: {e}", path.display())))?;
        let token: StoredToken = serde_json::from_str(&raw)?;
        let mut auth = Self::new(client_id, client_secret, token);
        auth.path = Some(path.to_path_buf());
        Ok(auth)
    }

    pub fn with_token_url(mut self, url: &str) -> Self {
        self.token_url = url.to_string();
        self
    }

    pub fn access_token(&self) -> String {
        self.token.lock().access_token.clone()
    }

    async fn refresh(&self) -> Result<(), Error> {
        let refresh_token = self.token.lock().refresh_token.clone();
        if refresh_token.is_empty() {
            return Err(Error::Auth("user token expired and no refresh token is stored".into()));
        }

        let resp = post_token_form(
            &self.http,
            &self.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ],
        )
        .await?;

        let updated = StoredToken {
            access_token: resp.access_token,
            refresh_token: resp.refresh_token.unwrap_or(refresh_token),
            expires_at: Some(Utc::now() + Duration::seconds(resp.expires_in)),
        };
        *self.token.lock() = updated.clone();
        info!("[Auth] user token refreshed; expires at {:?}", updated.expires_at);

        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&updated)?;
            if let Err(e) = tokio::fs::write(path, json).await {
                warn!("[Auth] could not save refreshed token to {}: {}", path.display(), e);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for UserTokenAuth {
    async fn ensure_valid(&self) -> Result<(), Error> {
        if !self.token.lock().needs_refresh(Utc::now()) {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock().await;
        // another caller may have refreshed while we waited
        if self.token.lock().needs_refresh(Utc::now()) {
            self.refresh().await?;
        }
        Ok(())
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(self.access_token())
            .header("Client-Id", &self.client_id)
    }
}

/// App access token from the client-credentials grant, cached until it
/// nears expiry. Used for sending chat as the bot.
pub struct AppTokenProvider {
    client_id: String,
    client_secret: String,
    token_url: String,
    http: ReqwestClient,
    token: Mutex<StoredToken>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl AppTokenProvider {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            http: ReqwestClient::new(),
            token: Mutex::new(StoredToken::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_token_url(mut self, url: &str) -> Self {
        self.token_url = url.to_string();
        self
    }
}

#[async_trait]
impl TokenProvider for AppTokenProvider {
    async fn ensure_valid(&self) -> Result<(), Error> {
        if !self.token.lock().needs_refresh(Utc::now()) {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock().await;
        if !self.token.lock().needs_refresh(Utc::now()) {
            return Ok(());
        }

        let resp = post_token_form(
            &self.http,
            &self.token_url,
            &[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ],
        )
        .await?;

        *self.token.lock() = StoredToken {
            access_token: resp.access_token,
            refresh_token: String::new(),
            expires_at: Some(Utc::now() + Duration::seconds(resp.expires_in)),
        };
        debug!("[Auth] app token acquired");
        Ok(())
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let access = self.token.lock().access_token.clone();
        req.bearer_auth(access).header("Client-Id", &self.client_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_needed_inside_margin() {
        let now = Utc::now();
        let fresh = StoredToken {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at: Some(now + Duration::minutes(30)),
        };
        assert!(!fresh.needs_refresh(now));

        let expiring = StoredToken {
            expires_at: Some(now + Duration::minutes(4)),
            ..fresh.clone()
        };
        assert!(expiring.needs_refresh(now));

        let empty = StoredToken::default();
        assert!(empty.needs_refresh(now));
    }
}
