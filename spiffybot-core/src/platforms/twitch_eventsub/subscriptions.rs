// File: spiffybot-core/src/platforms/twitch_eventsub/subscriptions.rs

use serde_json::{json, Value};

/// One `(type, version, condition)` registration.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionSpec {
    pub sub_type: &'static str,
    pub version: &'static str,
    pub condition: Value,
}

impl SubscriptionSpec {
    pub fn new(sub_type: &'static str, version: &'static str, condition: Value) -> Self {
        Self { sub_type, version, condition }
    }

    /// Request body for `POST /eventsub/subscriptions`.
    pub fn request_body(&self, session_id: &str) -> Value {
        json!({
            "type": self.sub_type,
            "version": self.version,
            "condition": self.condition,
            "transport": {
                "method": "websocket",
                "session_id": session_id
            }
        })
    }
}

/// What the bot account listens to: chat (read as the bot) and follows
/// (the follow topic needs a moderator id).
pub fn bot_subscriptions(
    broadcaster_id: &str,
    moderator_id: &str,
    bot_user_id: &str,
) -> Vec<SubscriptionSpec> {
    vec![
        SubscriptionSpec::new(
            "channel.chat.message",
            "1",
            json!({ "broadcaster_user_id": broadcaster_id, "user_id": bot_user_id }),
        ),
        SubscriptionSpec::new(
            "channel.follow",
            "2",
            json!({ "broadcaster_user_id": broadcaster_id, "moderator_user_id": moderator_id }),
        ),
    ]
}

/// Topics that need the broadcaster's own token.
pub fn broadcaster_subscriptions(broadcaster_id: &str) -> Vec<SubscriptionSpec> {
    vec![
        SubscriptionSpec::new("channel.subscribe", "1", json!({ "broadcaster_user_id": broadcaster_id })),
        SubscriptionSpec::new(
            "channel.subscription.message",
            "1",
            json!({ "broadcaster_user_id": broadcaster_id }),
        ),
        SubscriptionSpec::new(
            "channel.channel_points_custom_reward_redemption.add",
            "1",
            json!({ "broadcaster_user_id": broadcaster_id }),
        ),
        SubscriptionSpec::new("channel.cheer", "1", json!({ "broadcaster_user_id": broadcaster_id })),
        SubscriptionSpec::new("channel.raid", "1", json!({ "to_broadcaster_user_id": broadcaster_id })),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_websocket_transport() {
        let spec = &bot_subscriptions("100", "300", "200")[0];
        let body = spec.request_body("sess-1");
        assert_eq!(body["type"], "channel.chat.message");
        assert_eq!(body["version"], "1");
        assert_eq!(body["condition"]["user_id"], "200");
        assert_eq!(body["transport"]["method"], "websocket");
        assert_eq!(body["transport"]["session_id"], "sess-1");
    }

    #[test]
    fn broadcaster_set_is_in_fixed_order() {
        let types: Vec<_> = broadcaster_subscriptions("1").iter().map(|s| s.sub_type).collect();
        assert_eq!(
            types,
            vec![
                "channel.subscribe",
                "channel.subscription.message",
                "channel.channel_points_custom_reward_redemption.add",
                "channel.cheer",
                "channel.raid",
            ]
        );
    }
}
