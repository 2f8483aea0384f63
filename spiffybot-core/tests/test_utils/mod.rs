// File: spiffybot-core/tests/test_utils/mod.rs
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;

use spiffybot_common::models::{
    ChannelIdentity, ChannelInfo, CommandDef, CommandKind, GameInfo, Permission, RoleFlags, StreamInfo,
    UserIdentity,
};
use spiffybot_common::traits::{ChatApi, TokenProvider};
use spiffybot_common::Error;
use spiffybot_core::platforms::twitch_eventsub::events::ChatMessage;

pub const BROADCASTER_ID: &str = "1001";
pub const BOT_ID: &str = "2002";

pub fn channel() -> ChannelIdentity {
    ChannelIdentity::new(BROADCASTER_ID, BOT_ID)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentChat {
    pub broadcaster_id: String,
    pub sender_id: String,
    pub text: String,
    pub reply_parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentAnnouncement {
    pub text: String,
    pub color: String,
}

/// In-memory `ChatApi` that records every outbound call.
#[derive(Default)]
pub struct RecordingChatApi {
    sent: Mutex<Vec<SentChat>>,
    announcements: Mutex<Vec<SentAnnouncement>>,
    shoutouts: Mutex<Vec<String>>,
    stream: Mutex<Option<StreamInfo>>,
    users: Mutex<HashMap<String, UserIdentity>>,
    follows: Mutex<HashMap<String, DateTime<Utc>>>,
    fail_sends: AtomicBool,
    fail_lookups: AtomicBool,
    send_gate: Mutex<Option<Arc<Notify>>>,
    pub stream_lookups: AtomicUsize,
}

impl RecordingChatApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_live(&self, stream_id: &str) {
        *self.stream.lock() = Some(StreamInfo {
            id: stream_id.to_string(),
            user_id: BROADCASTER_ID.to_string(),
            started_at: Some(Utc::now()),
            ..Default::default()
        });
    }

    pub fn set_offline(&self) {
        *self.stream.lock() = None;
    }

    pub fn add_user(&self, id: &str, login: &str, display_name: &str) {
        self.users.lock().insert(
            login.to_lowercase(),
            UserIdentity {
                id: id.to_string(),
                login: login.to_string(),
                display_name: display_name.to_string(),
            },
        );
    }

    pub fn add_follow(&self, user_id: &str, since: DateTime<Utc>) {
        self.follows.lock().insert(user_id.to_string(), since);
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// The next chat send waits until the returned `Notify` fires.
    pub fn hold_next_send(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.send_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn sent(&self) -> Vec<SentChat> {
        self.sent.lock().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|m| m.text.clone()).collect()
    }

    pub fn announcements(&self) -> Vec<SentAnnouncement> {
        self.announcements.lock().clone()
    }

    pub fn shoutouts(&self) -> Vec<String> {
        self.shoutouts.lock().clone()
    }

    fn lookup_guard(&self) -> Result<(), Error> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(Error::Helix {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatApi for RecordingChatApi {
    async fn send_chat_message(
        &self,
        broadcaster_id: &str,
        sender_id: &str,
        text: &str,
        reply_parent_id: Option<&str>,
    ) -> Result<(), Error> {
        let gate = self.send_gate.lock().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(Error::Platform("chat message was not sent".into()));
        }
        self.sent.lock().push(SentChat {
            broadcaster_id: broadcaster_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            reply_parent_id: reply_parent_id.map(str::to_string),
        });
        Ok(())
    }

    async fn get_stream(&self, _user_id: &str) -> Result<Option<StreamInfo>, Error> {
        self.stream_lookups.fetch_add(1, Ordering::SeqCst);
        self.lookup_guard()?;
        Ok(self.stream.lock().clone())
    }

    async fn get_user_by_login(&self, login: &str) -> Result<Option<UserIdentity>, Error> {
        self.lookup_guard()?;
        Ok(self.users.lock().get(&login.to_lowercase()).cloned())
    }

    async fn get_channel_info(&self, broadcaster_id: &str) -> Result<Option<ChannelInfo>, Error> {
        self.lookup_guard()?;
        Ok(Some(ChannelInfo {
            broadcaster_id: broadcaster_id.to_string(),
            title: "Testing things".into(),
            game_name: "Just Chatting".into(),
            ..Default::default()
        }))
    }

    async fn update_title(&self, _broadcaster_id: &str, _title: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn update_game(&self, _broadcaster_id: &str, _game_id: &str) -> Result<(), Error> {
        Ok(())
    }

    async fn find_game(&self, query: &str) -> Result<Option<GameInfo>, Error> {
        Ok(Some(GameInfo {
            id: "509658".into(),
            name: query.to_string(),
        }))
    }

    async fn shoutout(&self, _from: &str, to: &str, _moderator: &str) -> Result<(), Error> {
        self.shoutouts.lock().push(to.to_string());
        Ok(())
    }

    async fn send_announcement(
        &self,
        _broadcaster_id: &str,
        _moderator_id: &str,
        text: &str,
        color: &str,
    ) -> Result<(), Error> {
        self.announcements.lock().push(SentAnnouncement {
            text: text.to_string(),
            color: color.to_string(),
        });
        Ok(())
    }

    async fn get_follow_since(
        &self,
        _broadcaster_id: &str,
        user_id: &str,
        _moderator_id: &str,
    ) -> Result<Option<DateTime<Utc>>, Error> {
        self.lookup_guard()?;
        Ok(self.follows.lock().get(user_id).copied())
    }

    async fn create_clip(&self, _broadcaster_id: &str) -> Result<Option<String>, Error> {
        Ok(Some("AwkwardClip123".into()))
    }
}

pub fn chat(user_id: &str, login: &str, text: &str, roles: RoleFlags) -> ChatMessage {
    ChatMessage {
        broadcaster_user_id: BROADCASTER_ID.to_string(),
        chatter_user_id: user_id.to_string(),
        chatter_user_login: login.to_string(),
        chatter_user_name: login.to_string(),
        message_id: format!("msg-{user_id}-{}", text.len()),
        text: text.to_string(),
        reply_parent_message_id: None,
        roles,
    }
}

pub fn viewer(user_id: &str, text: &str) -> ChatMessage {
    chat(user_id, &format!("viewer{user_id}"), text, RoleFlags::default())
}

pub fn moderator(user_id: &str, text: &str) -> ChatMessage {
    chat(
        user_id,
        &format!("mod{user_id}"),
        text,
        RoleFlags {
            moderator: true,
            ..Default::default()
        },
    )
}

pub fn static_command(name: &str, text: &str) -> CommandDef {
    CommandDef {
        name: name.to_string(),
        kind: CommandKind::Static,
        data: serde_json::json!({ "text": text }),
        ..Default::default()
    }
}

pub fn dynamic_command(name: &str, permission: Permission) -> CommandDef {
    CommandDef {
        name: name.to_string(),
        kind: CommandKind::Dynamic,
        permission,
        ..Default::default()
    }
}

/// Fixed bearer token, never refreshed.
pub struct StaticToken(pub &'static str);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn ensure_valid(&self) -> Result<(), Error> {
        Ok(())
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(self.0).header("Client-Id", "test-client")
    }
}
