// tests/event_announcer_tests.rs

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use spiffybot_common::models::EventsConfig;
use spiffybot_common::traits::ChatApi;
use spiffybot_core::platforms::twitch_eventsub::events::{
    CheerEvent, FollowEvent, InboundEvent, RaidEvent, RedemptionEvent, SubscribeEvent,
    SubscriptionMessageEvent,
};
use spiffybot_core::services::twitch::{AnnounceOutcome, EventAnnouncer, Suppression};

use test_utils::*;

fn everything_enabled() -> EventsConfig {
    let mut cfg = EventsConfig::default();
    cfg.subs.enabled = true;
    cfg.bits.enabled = true;
    cfg.raids.enabled = true;
    cfg.redemptions.enabled = true;
    cfg
}

fn announcer(api: &Arc<RecordingChatApi>, cfg: EventsConfig) -> EventAnnouncer {
    let api: Arc<dyn ChatApi> = api.clone();
    EventAnnouncer::new(api, channel(), cfg)
}

fn follow(id: &str, name: &str) -> FollowEvent {
    FollowEvent {
        broadcaster_user_id: BROADCASTER_ID.into(),
        user_id: id.into(),
        user_login: name.to_lowercase(),
        user_name: name.into(),
        followed_at: None,
    }
}

/// Lets spawned timer and send tasks run on the paused runtime.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn repeat_follows_inside_the_window_are_dropped() {
    let api = RecordingChatApi::new();
    let a = announcer(&api, EventsConfig::default());

    assert_eq!(a.handle_follow(&follow("11", "Alice")).await, AnnounceOutcome::Sent);
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(a.handle_follow(&follow("11", "Alice")).await, AnnounceOutcome::Deduplicated);

    // 16s after the first follow the entry has expired and the cooldown has passed
    tokio::time::advance(Duration::from_secs(15)).await;
    assert_eq!(a.handle_follow(&follow("11", "Alice")).await, AnnounceOutcome::Sent);

    assert_eq!(
        api.sent_texts(),
        vec!["❤️ Thanks for the follow, Alice!", "❤️ Thanks for the follow, Alice!"]
    );
}

#[tokio::test(start_paused = true)]
async fn follow_cooldown_applies_across_followers() {
    let api = RecordingChatApi::new();
    let a = announcer(&api, EventsConfig::default());

    assert_eq!(a.handle_follow(&follow("11", "Alice")).await, AnnounceOutcome::Sent);
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(
        a.handle_follow(&follow("12", "Bob")).await,
        AnnounceOutcome::Suppressed(Suppression::CategoryCooldown)
    );
    assert_eq!(api.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn batched_follows_flush_once_after_the_last_follow() {
    let api = RecordingChatApi::new();
    let mut cfg = EventsConfig::default();
    cfg.follows.batching.enabled = true;
    cfg.follows.batching.window_seconds = 20;
    let a = announcer(&api, cfg);

    assert_eq!(a.handle_follow(&follow("1", "Alice")).await, AnnounceOutcome::Batched);
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(a.handle_follow(&follow("2", "Bob")).await, AnnounceOutcome::Batched);
    tokio::time::advance(Duration::from_secs(5)).await;
    assert_eq!(a.handle_follow(&follow("3", "Carol")).await, AnnounceOutcome::Batched);
    // same display name from another account is listed once
    assert_eq!(a.handle_follow(&follow("4", "carol")).await, AnnounceOutcome::Batched);
    assert_eq!(a.pending_follow_batch(), vec!["Alice", "Bob", "Carol"]);

    // 20s after Alice but only 10s after Carol: the timer was re-armed
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert!(api.sent().is_empty());

    tokio::time::advance(Duration::from_secs(9)).await;
    settle().await;
    assert!(api.sent().is_empty());

    tokio::time::advance(Duration::from_secs(1)).await;
    settle().await;
    assert_eq!(api.sent_texts(), vec!["❤️ Thanks for the follows: Alice, Bob, Carol"]);
    assert!(a.pending_follow_batch().is_empty());

    // nothing more fires later
    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(api.sent().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pending_batch_is_dropped_when_follows_are_turned_off() {
    let api = RecordingChatApi::new();
    let mut cfg = EventsConfig::default();
    cfg.follows.batching.enabled = true;
    let a = announcer(&api, cfg.clone());

    assert_eq!(a.handle_follow(&follow("1", "Ada")).await, AnnounceOutcome::Batched);
    cfg.follows.enabled = false;
    a.set_config(cfg.clone());

    tokio::time::advance(Duration::from_secs(25)).await;
    settle().await;
    assert!(api.sent().is_empty());
    assert!(a.pending_follow_batch().is_empty());

    // same for switching batching off while the timer is armed
    cfg.follows.enabled = true;
    a.set_config(cfg.clone());
    assert_eq!(a.handle_follow(&follow("2", "Bea")).await, AnnounceOutcome::Batched);
    cfg.follows.batching.enabled = false;
    a.set_config(cfg);

    tokio::time::advance(Duration::from_secs(25)).await;
    settle().await;
    assert!(api.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn resub_sends_the_viewer_message_as_a_second_line() {
    let api = RecordingChatApi::new();
    let a = announcer(&api, everything_enabled());

    let resub = SubscriptionMessageEvent {
        user_id: "5".into(),
        user_login: "dana".into(),
        user_name: "Dana".into(),
        tier: "1000".into(),
        message: "  love this stream  ".into(),
        cumulative_months: 14,
        ..Default::default()
    };
    assert_eq!(a.handle_subscription_message(&resub).await, AnnounceOutcome::Sent);
    assert_eq!(
        api.sent_texts(),
        vec!["🔁 Dana resubbed (14 months)!", "💬 Dana: love this stream"]
    );

    tokio::time::advance(Duration::from_secs(10)).await;
    let quiet = SubscriptionMessageEvent {
        message: "   ".into(),
        ..resub
    };
    assert_eq!(a.handle_subscription_message(&quiet).await, AnnounceOutcome::Sent);
    assert_eq!(api.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn global_rate_limit_spans_categories() {
    let api = RecordingChatApi::new();
    let a = announcer(&api, everything_enabled());

    let raid = RaidEvent {
        from_broadcaster_user_login: "raidleader".into(),
        from_broadcaster_user_name: "RaidLeader".into(),
        viewers: 42,
        ..Default::default()
    };
    let cheer = CheerEvent {
        user_name: Some("Eve".into()),
        bits: 100,
        ..Default::default()
    };

    assert_eq!(a.handle_raid(&raid).await, AnnounceOutcome::Sent);
    let deadline = a.next_allowed_send().unwrap();
    assert_eq!(
        a.handle_cheer(&cheer).await,
        AnnounceOutcome::Suppressed(Suppression::RateLimited)
    );
    // a suppressed event does not move the deadline
    assert_eq!(a.next_allowed_send(), Some(deadline));

    tokio::time::advance(Duration::from_millis(1200)).await;
    assert_eq!(a.handle_cheer(&cheer).await, AnnounceOutcome::Sent);
    assert!(a.next_allowed_send().unwrap() > deadline);

    // raid cooldown (5s) outlasts the rate limit
    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(
        a.handle_raid(&raid).await,
        AnnounceOutcome::Suppressed(Suppression::CategoryCooldown)
    );

    assert_eq!(
        api.sent_texts(),
        vec![
            "🚀 Raid from RaidLeader with 42 viewers, welcome in!",
            "✨ Eve cheered 100 bits!",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn templates_fill_in_fallbacks() {
    let api = RecordingChatApi::new();
    let a = announcer(&api, everything_enabled());
    let gap = Duration::from_secs(2);

    let gift = SubscribeEvent {
        user_login: "frank".into(),
        tier: "2000".into(),
        is_gift: true,
        gifter_user_name: Some("Grace".into()),
        ..Default::default()
    };
    a.handle_subscribe(&gift).await;
    tokio::time::advance(gap).await;

    let anonymous = CheerEvent {
        is_anonymous: true,
        user_name: Some("Hidden".into()),
        bits: 5,
        ..Default::default()
    };
    a.handle_cheer(&anonymous).await;
    tokio::time::advance(gap).await;

    let redemption = RedemptionEvent {
        user_name: "Ivy".into(),
        reward_title: "Hydrate".into(),
        user_input: "water please".into(),
        reward_cost: 500,
        ..Default::default()
    };
    a.handle_redemption(&redemption).await;
    tokio::time::advance(Duration::from_secs(3)).await;
    let no_input = RedemptionEvent {
        user_input: " ".into(),
        ..redemption
    };
    a.handle_redemption(&no_input).await;

    assert_eq!(
        api.sent_texts(),
        vec![
            "🎁 Grace gifted a sub to frank!",
            "✨ Anonymous cheered 5 bits!",
            "🟣 Ivy redeemed “Hydrate”: water please",
            "🟣 Ivy redeemed “Hydrate”",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn disabled_categories_send_nothing() {
    let api = RecordingChatApi::new();
    let mut cfg = EventsConfig::default();
    cfg.follows.enabled = false;
    let a = announcer(&api, cfg);

    assert_eq!(a.handle_follow(&follow("1", "Alice")).await, AnnounceOutcome::Disabled);
    assert_eq!(
        a.handle_subscribe(&SubscribeEvent::default()).await,
        AnnounceOutcome::Disabled
    );
    let chat_only = InboundEvent::ChatMessage(viewer("1", "hello"));
    assert_eq!(a.handle_event(&chat_only).await, None);
    assert!(api.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_send_still_consumes_the_slot() {
    let api = RecordingChatApi::new();
    let a = announcer(&api, everything_enabled());
    let raid = RaidEvent {
        from_broadcaster_user_name: "RaidLeader".into(),
        viewers: 3,
        ..Default::default()
    };

    api.fail_sends(true);
    assert_eq!(a.handle_raid(&raid).await, AnnounceOutcome::SendFailed);
    api.fail_sends(false);
    assert_eq!(
        a.handle_raid(&raid).await,
        AnnounceOutcome::Suppressed(Suppression::CategoryCooldown)
    );
}

#[tokio::test(start_paused = true)]
async fn set_config_keeps_cooldowns() {
    let api = RecordingChatApi::new();
    let a = announcer(&api, everything_enabled());
    let raid = RaidEvent {
        from_broadcaster_user_name: "RaidLeader".into(),
        viewers: 3,
        ..Default::default()
    };
    assert_eq!(a.handle_raid(&raid).await, AnnounceOutcome::Sent);

    let mut cfg = everything_enabled();
    cfg.raids.template = "Welcome raiders from {raider.name}!".into();
    a.set_config(cfg);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(
        a.handle_raid(&raid).await,
        AnnounceOutcome::Suppressed(Suppression::CategoryCooldown)
    );
    tokio::time::advance(Duration::from_secs(3)).await;
    assert_eq!(a.handle_raid(&raid).await, AnnounceOutcome::Sent);
    assert_eq!(api.sent_texts()[1], "Welcome raiders from RaidLeader!");
}
