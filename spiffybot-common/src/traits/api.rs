// File: spiffybot-common/src/traits/api.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::models::helix::{ChannelInfo, GameInfo, Quote, StreamInfo, UserIdentity};

/// Outbound Twitch surface shared by the dispatcher, the event announcer and
/// the announcement scheduler. One attempt per call; no retries.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Posts a chat line as `sender_id`, threaded under `reply_parent_id` when given.
    async fn send_chat_message(
        &self,
        broadcaster_id: &str,
        sender_id: &str,
        text: &str,
        reply_parent_id: Option<&str>,
    ) -> Result<(), Error>;

    /// `None` when the user is offline.
    async fn get_stream(&self, user_id: &str) -> Result<Option<StreamInfo>, Error>;

    async fn is_live(&self, user_id: &str) -> Result<bool, Error> {
        Ok(self.get_stream(user_id).await?.is_some())
    }

    async fn get_stream_start_time(&self, user_id: &str) -> Result<Option<DateTime<Utc>>, Error> {
        Ok(self.get_stream(user_id).await?.and_then(|s| s.started_at))
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<UserIdentity>, Error>;

    async fn get_channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>, Error>;

    async fn update_title(&self, broadcaster_id: &str, title: &str) -> Result<(), Error>;

    async fn update_game(&self, broadcaster_id: &str, game_id: &str) -> Result<(), Error>;

    /// Looks a category up by numeric id or by name.
    async fn find_game(&self, query: &str) -> Result<Option<GameInfo>, Error>;

    async fn shoutout(
        &self,
        from_broadcaster_id: &str,
        to_broadcaster_id: &str,
        moderator_id: &str,
    ) -> Result<(), Error>;

    async fn send_announcement(
        &self,
        broadcaster_id: &str,
        moderator_id: &str,
        text: &str,
        color: &str,
    ) -> Result<(), Error>;

    /// When `user_id` started following, `None` if they don't.
    async fn get_follow_since(
        &self,
        broadcaster_id: &str,
        user_id: &str,
        moderator_id: &str,
    ) -> Result<Option<DateTime<Utc>>, Error>;

    /// Returns the new clip id.
    async fn create_clip(&self, broadcaster_id: &str) -> Result<Option<String>, Error>;
}

/// Storage behind `!quote`, `!addquote` and `!delquote`.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait QuoteStore: Send + Sync {
    async fn random_quote(&self) -> Result<Option<Quote>, Error>;
    async fn quote_by_id(&self, id: i64) -> Result<Option<Quote>, Error>;
    async fn search_quote(&self, needle: &str) -> Result<Option<Quote>, Error>;
    async fn add_quote(&self, text: &str, user_id: &str, user_login: &str) -> Result<i64, Error>;
    async fn delete_quote(&self, id: i64) -> Result<bool, Error>;
}
