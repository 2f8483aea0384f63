// File: spiffybot-core/src/platforms/twitch_helix/client.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use spiffybot_common::models::helix::{
    ChannelInfo, GameInfo, HelixList, StreamInfo, UserIdentity,
};
use spiffybot_common::traits::{ChatApi, TokenProvider};

use crate::Error;
use crate::platforms::twitch_eventsub::runtime::DEFAULT_HELIX_BASE;

#[derive(Debug, Deserialize)]
struct SentMessage {
    #[serde(default)]
    is_sent: bool,
    #[serde(default)]
    drop_reason: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FollowerRecord {
    followed_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CreatedClip {
    id: String,
}

/// Helix calls used by the bot.
///
/// - chat lines go out with the app token (the bot's chat identity),
/// - moderation calls use the moderator token when one is configured,
/// - everything else uses the broadcaster's user token.
pub struct HelixClient {
    http: ReqwestClient,
    base: String,
    broadcaster_auth: Arc<dyn TokenProvider>,
    app_auth: Arc<dyn TokenProvider>,
    moderator_auth: Option<Arc<dyn TokenProvider>>,
}

impl HelixClient {
    pub fn new(broadcaster_auth: Arc<dyn TokenProvider>, app_auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: ReqwestClient::new(),
            base: DEFAULT_HELIX_BASE.to_string(),
            broadcaster_auth,
            app_auth,
            moderator_auth: None,
        }
    }

    pub fn with_moderator_auth(mut self, auth: Arc<dyn TokenProvider>) -> Self {
        self.moderator_auth = Some(auth);
        self
    }

    pub fn with_base_url(mut self, base: &str) -> Self {
        self.base = base.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    fn moderator(&self) -> &Arc<dyn TokenProvider> {
        self.moderator_auth.as_ref().unwrap_or(&self.broadcaster_auth)
    }

    async fn send_with(&self, auth: &Arc<dyn TokenProvider>, req: RequestBuilder) -> Result<Response, Error> {
        auth.ensure_valid().await?;
        let resp = auth.apply_auth(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("[Helix] HTTP {} => {}", status, body);
            return Err(Error::Helix {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn get_list<T: DeserializeOwned>(
        &self,
        auth: &Arc<dyn TokenProvider>,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, Error> {
        let req = self.http.get(self.url(path)).query(query);
        let resp = self.send_with(auth, req).await?;
        Ok(resp.json::<HelixList<T>>().await?.data)
    }

    async fn get_first<T: DeserializeOwned>(
        &self,
        auth: &Arc<dyn TokenProvider>,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, Error> {
        Ok(self.get_list(auth, path, query).await?.into_iter().next())
    }
}

#[async_trait]
impl ChatApi for HelixClient {
    async fn send_chat_message(
        &self,
        broadcaster_id: &str,
        sender_id: &str,
        text: &str,
        reply_parent_id: Option<&str>,
    ) -> Result<(), Error> {
        let mut body = json!({
            "broadcaster_id": broadcaster_id,
            "sender_id": sender_id,
            "message": text,
        });
        if let Some(parent) = reply_parent_id.filter(|p| !p.is_empty()) {
            body["reply_parent_message_id"] = json!(parent);
        }

        let req = self.http.post(self.url("/chat/messages")).json(&body);
        let resp = self.send_with(&self.app_auth, req).await?;
        let sent: HelixList<SentMessage> = resp.json().await?;

        match sent.data.first() {
            Some(m) if !m.is_sent => {
                warn!("[Helix] chat message dropped: {:?}", m.drop_reason);
                Err(Error::Platform(format!("chat message dropped: {:?}", m.drop_reason)))
            }
            _ => {
                debug!("[Helix] chat message sent to {}", broadcaster_id);
                Ok(())
            }
        }
    }

    async fn get_stream(&self, user_id: &str) -> Result<Option<StreamInfo>, Error> {
        self.get_first(&self.broadcaster_auth, "/streams", &[("user_id", user_id)])
            .await
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<UserIdentity>, Error> {
        self.get_first(&self.broadcaster_auth, "/users", &[("login", login)])
            .await
    }

    async fn get_channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>, Error> {
        self.get_first(&self.broadcaster_auth, "/channels", &[("broadcaster_id", broadcaster_id)])
            .await
    }

    async fn update_title(&self, broadcaster_id: &str, title: &str) -> Result<(), Error> {
        let req = self
            .http
            .patch(self.url("/channels"))
            .query(&[("broadcaster_id", broadcaster_id)])
            .json(&json!({ "title": title }));
        self.send_with(&self.broadcaster_auth, req).await?;
        Ok(())
    }

    async fn update_game(&self, broadcaster_id: &str, game_id: &str) -> Result<(), Error> {
        let req = self
            .http
            .patch(self.url("/channels"))
            .query(&[("broadcaster_id", broadcaster_id)])
            .json(&json!({ "game_id": game_id }));
        self.send_with(&self.broadcaster_auth, req).await?;
        Ok(())
    }

    async fn find_game(&self, query: &str) -> Result<Option<GameInfo>, Error> {
        let query = query.trim();
        if !query.is_empty() && query.chars().all(|c| c.is_ascii_digit()) {
            return self.get_first(&self.broadcaster_auth, "/games", &[("id", query)]).await;
        }
        if let Some(game) = self.get_first(&self.broadcaster_auth, "/games", &[("name", query)]).await? {
            return Ok(Some(game));
        }
        self.get_first(
            &self.broadcaster_auth,
            "/search/categories",
            &[("query", query), ("first", "1")],
        )
        .await
    }

    async fn shoutout(
        &self,
        from_broadcaster_id: &str,
        to_broadcaster_id: &str,
        moderator_id: &str,
    ) -> Result<(), Error> {
        let req = self.http.post(self.url("/chat/shoutouts")).query(&[
            ("from_broadcaster_id", from_broadcaster_id),
            ("to_broadcaster_id", to_broadcaster_id),
            ("moderator_id", moderator_id),
        ]);
        self.send_with(self.moderator(), req).await?;
        Ok(())
    }

    async fn send_announcement(
        &self,
        broadcaster_id: &str,
        moderator_id: &str,
        text: &str,
        color: &str,
    ) -> Result<(), Error> {
        let req = self
            .http
            .post(self.url("/chat/announcements"))
            .query(&[("broadcaster_id", broadcaster_id), ("moderator_id", moderator_id)])
            .json(&json!({ "message": text, "color": color }));
        self.send_with(self.moderator(), req).await?;
        Ok(())
    }

    async fn get_follow_since(
        &self,
        broadcaster_id: &str,
        user_id: &str,
        _moderator_id: &str,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        let rec: Option<FollowerRecord> = self
            .get_first(
                self.moderator(),
                "/channels/followers",
                &[("broadcaster_id", broadcaster_id), ("user_id", user_id)],
            )
            .await?;
        Ok(rec.map(|r| r.followed_at))
    }

    async fn create_clip(&self, broadcaster_id: &str) -> Result<Option<String>, Error> {
        let req = self
            .http
            .post(self.url("/clips"))
            .query(&[("broadcaster_id", broadcaster_id)]);
        let resp = self.send_with(&self.broadcaster_auth, req).await?;
        let clips: HelixList<CreatedClip> = resp.json().await?;
        Ok(clips.data.into_iter().next().map(|c| c.id))
    }
}
