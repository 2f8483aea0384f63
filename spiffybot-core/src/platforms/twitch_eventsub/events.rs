// File: spiffybot-core/src/platforms/twitch_eventsub/events.rs
//
// Typed EventSub notifications. Decoding is best-effort: each field is read
// on its own and falls back to an empty/zero value, so a payload that lacks
// (or mistypes) one field still produces an event.

use chrono::{DateTime, Utc};
use serde_json::Value;

use spiffybot_common::models::RoleFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ChatMessage,
    Follow,
    Subscribe,
    SubscriptionMessage,
    Redemption,
    Cheer,
    Raid,
}

impl EventKind {
    pub fn from_subscription_type(sub_type: &str) -> Option<Self> {
        Some(match sub_type {
            "channel.chat.message" => EventKind::ChatMessage,
            "channel.follow" => EventKind::Follow,
            "channel.subscribe" => EventKind::Subscribe,
            "channel.subscription.message" => EventKind::SubscriptionMessage,
            "channel.channel_points_custom_reward_redemption.add" => EventKind::Redemption,
            "channel.cheer" => EventKind::Cheer,
            "channel.raid" => EventKind::Raid,
            _ => return None,
        })
    }

    pub fn subscription_type(&self) -> &'static str {
        match self {
            EventKind::ChatMessage => "channel.chat.message",
            EventKind::Follow => "channel.follow",
            EventKind::Subscribe => "channel.subscribe",
            EventKind::SubscriptionMessage => "channel.subscription.message",
            EventKind::Redemption => "channel.channel_points_custom_reward_redemption.add",
            EventKind::Cheer => "channel.cheer",
            EventKind::Raid => "channel.raid",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatMessage {
    pub broadcaster_user_id: String,
    pub chatter_user_id: String,
    pub chatter_user_login: String,
    pub chatter_user_name: String,
    pub message_id: String,
    pub text: String,
    /// Set when the message is itself a reply.
    pub reply_parent_message_id: Option<String>,
    pub roles: RoleFlags,
}

impl ChatMessage {
    pub fn display_name(&self) -> &str {
        if self.chatter_user_name.trim().is_empty() {
            &self.chatter_user_login
        } else {
            &self.chatter_user_name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowEvent {
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub followed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscribeEvent {
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub tier: String,
    pub is_gift: bool,
    pub gifter_user_login: Option<String>,
    pub gifter_user_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionMessageEvent {
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub tier: String,
    pub message: String,
    pub cumulative_months: u64,
    pub streak_months: Option<u64>,
    pub duration_months: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RedemptionEvent {
    pub id: String,
    pub broadcaster_user_id: String,
    pub user_id: String,
    pub user_login: String,
    pub user_name: String,
    pub user_input: String,
    pub reward_id: String,
    pub reward_title: String,
    pub reward_cost: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheerEvent {
    pub broadcaster_user_id: String,
    pub is_anonymous: bool,
    pub user_id: Option<String>,
    pub user_login: Option<String>,
    pub user_name: Option<String>,
    pub message: String,
    pub bits: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaidEvent {
    /// The raided channel, i.e. ours.
    pub broadcaster_user_id: String,
    pub from_broadcaster_user_id: String,
    pub from_broadcaster_user_login: String,
    pub from_broadcaster_user_name: String,
    pub viewers: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    ChatMessage(ChatMessage),
    Follow(FollowEvent),
    Subscribe(SubscribeEvent),
    SubscriptionMessage(SubscriptionMessageEvent),
    Redemption(RedemptionEvent),
    Cheer(CheerEvent),
    Raid(RaidEvent),
}

impl InboundEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::ChatMessage(_) => EventKind::ChatMessage,
            InboundEvent::Follow(_) => EventKind::Follow,
            InboundEvent::Subscribe(_) => EventKind::Subscribe,
            InboundEvent::SubscriptionMessage(_) => EventKind::SubscriptionMessage,
            InboundEvent::Redemption(_) => EventKind::Redemption,
            InboundEvent::Cheer(_) => EventKind::Cheer,
            InboundEvent::Raid(_) => EventKind::Raid,
        }
    }

    pub fn broadcaster_id(&self) -> &str {
        match self {
            InboundEvent::ChatMessage(e) => &e.broadcaster_user_id,
            InboundEvent::Follow(e) => &e.broadcaster_user_id,
            InboundEvent::Subscribe(e) => &e.broadcaster_user_id,
            InboundEvent::SubscriptionMessage(e) => &e.broadcaster_user_id,
            InboundEvent::Redemption(e) => &e.broadcaster_user_id,
            InboundEvent::Cheer(e) => &e.broadcaster_user_id,
            InboundEvent::Raid(e) => &e.broadcaster_user_id,
        }
    }
}

/// Decodes `payload.event` of a notification. `None` only for
/// subscription types the bot does not handle.
pub fn decode_notification(sub_type: &str, event: &Value) -> Option<InboundEvent> {
    let kind = EventKind::from_subscription_type(sub_type)?;
    let ev = match kind {
        EventKind::ChatMessage => InboundEvent::ChatMessage(decode_chat_message(event)),
        EventKind::Follow => InboundEvent::Follow(FollowEvent {
            broadcaster_user_id: str_at(event, "/broadcaster_user_id"),
            user_id: str_at(event, "/user_id"),
            user_login: str_at(event, "/user_login"),
            user_name: str_at(event, "/user_name"),
            followed_at: time_at(event, "/followed_at"),
        }),
        EventKind::Subscribe => InboundEvent::Subscribe(SubscribeEvent {
            broadcaster_user_id: str_at(event, "/broadcaster_user_id"),
            user_id: str_at(event, "/user_id"),
            user_login: str_at(event, "/user_login"),
            user_name: str_at(event, "/user_name"),
            tier: str_at(event, "/tier"),
            is_gift: bool_at(event, "/is_gift"),
            gifter_user_login: opt_str_at(event, "/gifter_user_login"),
            gifter_user_name: opt_str_at(event, "/gifter_user_name"),
        }),
        EventKind::SubscriptionMessage => InboundEvent::SubscriptionMessage(SubscriptionMessageEvent {
            broadcaster_user_id: str_at(event, "/broadcaster_user_id"),
            user_id: str_at(event, "/user_id"),
            user_login: str_at(event, "/user_login"),
            user_name: str_at(event, "/user_name"),
            tier: str_at(event, "/tier"),
            message: str_at(event, "/message/text"),
            cumulative_months: u64_at(event, "/cumulative_months"),
            streak_months: event.pointer("/streak_months").and_then(as_u64),
            duration_months: u64_at(event, "/duration_months"),
        }),
        EventKind::Redemption => InboundEvent::Redemption(RedemptionEvent {
            id: str_at(event, "/id"),
            broadcaster_user_id: str_at(event, "/broadcaster_user_id"),
            user_id: str_at(event, "/user_id"),
            user_login: str_at(event, "/user_login"),
            user_name: str_at(event, "/user_name"),
            user_input: str_at(event, "/user_input"),
            reward_id: str_at(event, "/reward/id"),
            reward_title: str_at(event, "/reward/title"),
            reward_cost: u64_at(event, "/reward/cost"),
        }),
        EventKind::Cheer => InboundEvent::Cheer(CheerEvent {
            broadcaster_user_id: str_at(event, "/broadcaster_user_id"),
            is_anonymous: bool_at(event, "/is_anonymous"),
            user_id: opt_str_at(event, "/user_id"),
            user_login: opt_str_at(event, "/user_login"),
            user_name: opt_str_at(event, "/user_name"),
            message: str_at(event, "/message"),
            bits: u64_at(event, "/bits"),
        }),
        EventKind::Raid => InboundEvent::Raid(RaidEvent {
            broadcaster_user_id: str_at(event, "/to_broadcaster_user_id"),
            from_broadcaster_user_id: str_at(event, "/from_broadcaster_user_id"),
            from_broadcaster_user_login: str_at(event, "/from_broadcaster_user_login"),
            from_broadcaster_user_name: str_at(event, "/from_broadcaster_user_name"),
            viewers: u64_at(event, "/viewers"),
        }),
    };
    Some(ev)
}

fn decode_chat_message(event: &Value) -> ChatMessage {
    let mut roles = RoleFlags::default();
    if let Some(badges) = event.get("badges").and_then(Value::as_array) {
        for badge in badges {
            match badge.get("set_id").and_then(Value::as_str) {
                Some("broadcaster") => roles.broadcaster = true,
                Some("moderator") => roles.moderator = true,
                Some("vip") => roles.vip = true,
                Some("subscriber") | Some("founder") => roles.subscriber = true,
                _ => {}
            }
        }
    }

    let message_id = opt_str_at(event, "/message_id")
        .or_else(|| opt_str_at(event, "/message/id"))
        .unwrap_or_default();

    ChatMessage {
        broadcaster_user_id: str_at(event, "/broadcaster_user_id"),
        chatter_user_id: str_at(event, "/chatter_user_id"),
        chatter_user_login: str_at(event, "/chatter_user_login"),
        chatter_user_name: str_at(event, "/chatter_user_name"),
        message_id,
        text: str_at(event, "/message/text"),
        reply_parent_message_id: opt_str_at(event, "/reply/parent_message_id"),
        roles,
    }
}

fn str_at(v: &Value, ptr: &str) -> String {
    opt_str_at(v, ptr).unwrap_or_default()
}

fn opt_str_at(v: &Value, ptr: &str) -> Option<String> {
    v.pointer(ptr)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn as_u64(v: &Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

fn u64_at(v: &Value, ptr: &str) -> u64 {
    v.pointer(ptr).and_then(as_u64).unwrap_or_default()
}

fn bool_at(v: &Value, ptr: &str) -> bool {
    v.pointer(ptr).and_then(Value::as_bool).unwrap_or(false)
}

fn time_at(v: &Value, ptr: &str) -> Option<DateTime<Utc>> {
    v.pointer(ptr)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
