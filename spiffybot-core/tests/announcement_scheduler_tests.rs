// tests/announcement_scheduler_tests.rs

mod test_utils;

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use spiffybot_common::models::{AnnouncementMessage, AnnouncementsConfig, QuietHoursConfig};
use spiffybot_common::traits::ChatApi;
use spiffybot_core::tasks::announcements::{AnnouncementScheduler, SkipReason, TickOutcome};

use test_utils::*;

fn message(text: &str) -> AnnouncementMessage {
    AnnouncementMessage {
        text: text.into(),
        min_interval_minutes: 5.0,
        weight: 1,
    }
}

fn config(messages: Vec<AnnouncementMessage>) -> AnnouncementsConfig {
    AnnouncementsConfig {
        enabled: true,
        online_only: false,
        min_gap_minutes: 1.0,
        messages,
        ..Default::default()
    }
}

fn scheduler(api: &Arc<RecordingChatApi>, cfg: AnnouncementsConfig) -> Arc<AnnouncementScheduler> {
    let api: Arc<dyn ChatApi> = api.clone();
    Arc::new(AnnouncementScheduler::new(api, channel(), cfg).with_rng_seed(11))
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn disabled_and_offline_skip() {
    let api = RecordingChatApi::new();

    let mut off = config(vec![message("hi")]);
    off.enabled = false;
    assert_eq!(
        scheduler(&api, off).tick().await,
        TickOutcome::Skipped(SkipReason::Disabled)
    );

    let mut live_only = config(vec![message("hi")]);
    live_only.online_only = true;
    let s = scheduler(&api, live_only);
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::Offline));

    api.fail_lookups(true);
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::LivenessUnknown));

    api.fail_lookups(false);
    api.set_live("stream-1");
    assert_eq!(s.tick().await, TickOutcome::Sent { index: 0 });
    assert_eq!(api.sent_texts(), vec!["hi"]);
}

#[tokio::test(start_paused = true)]
async fn gap_and_no_immediate_repeat() {
    let api = RecordingChatApi::new();
    let s = scheduler(&api, config(vec![message("follow the socials"), message("join the discord")]));

    let TickOutcome::Sent { index: first } = s.tick().await else {
        panic!("first tick should send");
    };
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::GapNotElapsed));

    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(s.tick().await, TickOutcome::Sent { index: 1 - first });

    // both messages are inside their own 5 minute interval now
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::NothingEligible));

    tokio::time::advance(Duration::from_secs(240)).await;
    assert_eq!(s.tick().await, TickOutcome::Sent { index: first });
    assert_eq!(api.sent().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn a_single_message_repeats_after_its_interval() {
    let api = RecordingChatApi::new();
    let s = scheduler(&api, config(vec![message("only one")]));

    assert_eq!(s.tick().await, TickOutcome::Sent { index: 0 });
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::NothingEligible));
    tokio::time::advance(Duration::from_secs(240)).await;
    assert_eq!(s.tick().await, TickOutcome::Sent { index: 0 });
}

#[tokio::test(start_paused = true)]
async fn activity_gate_needs_recent_chat() {
    let api = RecordingChatApi::new();
    let mut cfg = config(vec![message("hi")]);
    cfg.activity.enabled = true;
    cfg.activity.no_chat_minutes = 1.0;
    let s = scheduler(&api, cfg);

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::ChatInactive));

    s.note_chat_activity();
    assert_eq!(s.tick().await, TickOutcome::Sent { index: 0 });
}

#[tokio::test(start_paused = true)]
async fn quiet_hours_hold_announcements() {
    let api = RecordingChatApi::new();
    let mut cfg = config(vec![message("hi")]);
    cfg.quiet_hours = Some(QuietHoursConfig {
        start: "23:00".into(),
        end: "06:00".into(),
        timezone: "UTC".into(),
    });
    let s = scheduler(&api, cfg);

    let night = Utc.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();
    assert_eq!(s.tick_at(night).await, TickOutcome::Skipped(SkipReason::QuietHours));

    let afternoon = Utc.with_ymd_and_hms(2024, 5, 1, 15, 0, 0).unwrap();
    assert_eq!(s.tick_at(afternoon).await, TickOutcome::Sent { index: 0 });
}

#[tokio::test(start_paused = true)]
async fn blank_text_is_skipped_and_failures_do_not_advance() {
    let api = RecordingChatApi::new();
    let s = scheduler(&api, config(vec![message("   ")]));
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::BlankText));

    s.set_config(config(vec![message("hello")]));
    api.fail_sends(true);
    assert_eq!(s.tick().await, TickOutcome::SendFailed { index: 0 });
    api.fail_sends(false);
    assert_eq!(s.tick().await, TickOutcome::Sent { index: 0 });
}

#[tokio::test(start_paused = true)]
async fn oversized_pacing_saturates() {
    let api = RecordingChatApi::new();
    let mut cfg = config(vec![message("hi")]);
    cfg.min_gap_minutes = 1e300;
    cfg.messages[0].min_interval_minutes = f64::INFINITY;
    let s = scheduler(&api, cfg);

    assert_eq!(s.tick().await, TickOutcome::Sent { index: 0 });
    tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::GapNotElapsed));
    assert_eq!(api.sent_texts(), vec!["hi"]);
}

#[tokio::test(start_paused = true)]
async fn config_swapped_during_a_send_keeps_its_own_pacing() {
    let api = RecordingChatApi::new();
    let s = scheduler(&api, config(vec![message("old")]));

    let release = api.hold_next_send();
    let ticking = tokio::spawn({
        let s = s.clone();
        async move { s.tick().await }
    });
    settle().await;
    s.set_config(config(vec![message("new")]));
    release.notify_one();
    assert_eq!(ticking.await.unwrap(), TickOutcome::Sent { index: 0 });

    // the global gap still counts the message that went out
    assert_eq!(s.tick().await, TickOutcome::Skipped(SkipReason::GapNotElapsed));
    tokio::time::advance(Duration::from_secs(60)).await;
    // the new list's message 0 was never paced by the old one
    assert_eq!(s.tick().await, TickOutcome::Sent { index: 0 });
    assert_eq!(api.sent_texts(), vec!["old", "new"]);
}

#[tokio::test(start_paused = true)]
async fn start_and_stop_drive_the_tick_loop() {
    let api = RecordingChatApi::new();
    let api_dyn: Arc<dyn ChatApi> = api.clone();
    let s = Arc::new(
        AnnouncementScheduler::new(api_dyn, channel(), config(vec![message("a"), message("b")]))
            .with_tick_interval(Duration::from_secs(30)),
    );

    s.start();
    s.start();
    assert!(s.is_running());
    settle().await;
    assert!(api.sent().is_empty());

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(api.sent().len(), 1);

    // the gap is 60s, so the next tick only skips
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(api.sent().len(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(api.sent().len(), 2);

    s.stop().await;
    assert!(!s.is_running());
    tokio::time::advance(Duration::from_secs(600)).await;
    settle().await;
    assert_eq!(api.sent().len(), 2);
}
