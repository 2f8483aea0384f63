// File: spiffybot-core/src/tasks/announcements.rs
//
// Timed promotional messages. Runs on its own tick, independent of any socket.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use spiffybot_common::models::{AnnouncementMessage, AnnouncementsConfig, ChannelIdentity, QuietHoursConfig};
use spiffybot_common::traits::ChatApi;

use crate::utils::time::{deadline_after, parse_hhmm};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    Offline,
    LivenessUnknown,
    QuietHours,
    ChatInactive,
    GapNotElapsed,
    NothingEligible,
    BlankText,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Skipped(SkipReason),
    SendFailed { index: usize },
    Sent { index: usize },
}

struct SchedulerState {
    next_global: Option<Instant>,
    next_per_message: HashMap<usize, Instant>,
    last_index: Option<usize>,
    last_chat: Instant,
    rng: StdRng,
}

struct RunningTask {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct AnnouncementScheduler {
    api: Arc<dyn ChatApi>,
    channel: ChannelIdentity,
    config: RwLock<Arc<AnnouncementsConfig>>,
    state: Mutex<SchedulerState>,
    tick_interval: Duration,
    running: Mutex<Option<RunningTask>>,
}

impl AnnouncementScheduler {
    pub fn new(api: Arc<dyn ChatApi>, channel: ChannelIdentity, config: AnnouncementsConfig) -> Self {
        Self {
            api,
            channel,
            config: RwLock::new(Arc::new(config)),
            state: Mutex::new(SchedulerState {
                next_global: None,
                next_per_message: HashMap::new(),
                last_index: None,
                // the activity window starts counting at construction
                last_chat: Instant::now(),
                rng: StdRng::from_os_rng(),
            }),
            tick_interval: DEFAULT_TICK_INTERVAL,
            running: Mutex::new(None),
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval.max(Duration::from_millis(100));
        self
    }

    /// Deterministic picks, for tests.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        self.state.lock().rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Swaps the message list and gates. Per-message pacing is keyed by
    /// position, so it is reset along with the last pick.
    pub fn set_config(&self, config: AnnouncementsConfig) {
        *self.config.write() = Arc::new(config);
        let mut st = self.state.lock();
        st.next_per_message.clear();
        st.last_index = None;
    }

    pub fn note_chat_activity(&self) {
        self.state.lock().last_chat = Instant::now();
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Spawns the tick loop. A second call while running is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut running = self.running.lock();
        if running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let me = Arc::clone(self);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(me.tick_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval yields immediately once; the first real tick is one period out
            ticker.tick().await;

            info!("[Announcements] scheduler started (tick {:?})", me.tick_interval);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let outcome = me.tick().await;
                        debug!("[Announcements] tick: {:?}", outcome);
                    }
                }
            }
            info!("[Announcements] scheduler stopped");
        });

        *running = Some(RunningTask { cancel, task });
    }

    /// Cancels the loop and waits for it. A tick already sending finishes first.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            warn!("[Announcements] scheduler task ended abnormally: {}", e);
        }
    }

    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(Utc::now()).await
    }

    /// One scheduling decision with `now` as the wall clock for quiet hours.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> TickOutcome {
        let cfg = self.config.read().clone();
        if !cfg.enabled {
            return TickOutcome::Skipped(SkipReason::Disabled);
        }

        if cfg.online_only {
            match self.api.is_live(&self.channel.broadcaster_id).await {
                Ok(true) => {}
                Ok(false) => return TickOutcome::Skipped(SkipReason::Offline),
                Err(e) => {
                    warn!("[Announcements] liveness check failed: {}", e);
                    return TickOutcome::Skipped(SkipReason::LivenessUnknown);
                }
            }
        }

        if cfg.quiet_hours.as_ref().is_some_and(|qh| in_quiet_hours(qh, now)) {
            return TickOutcome::Skipped(SkipReason::QuietHours);
        }

        let (index, text) = {
            let mut st = self.state.lock();
            let clock = Instant::now();

            if cfg.activity.enabled && clock.duration_since(st.last_chat) > cfg.activity.no_chat_window() {
                return TickOutcome::Skipped(SkipReason::ChatInactive);
            }
            if st.next_global.is_some_and(|t| clock < t) {
                return TickOutcome::Skipped(SkipReason::GapNotElapsed);
            }

            let eligible = eligible_indices(&cfg.messages, &st.next_per_message, st.last_index, clock);
            let Some(index) = pick_message_index(&cfg.messages, &eligible, &mut st.rng) else {
                return TickOutcome::Skipped(SkipReason::NothingEligible);
            };
            (index, cfg.messages[index].text.trim().to_string())
        };

        if text.is_empty() {
            return TickOutcome::Skipped(SkipReason::BlankText);
        }

        if let Err(e) = self
            .api
            .send_chat_message(&self.channel.broadcaster_id, &self.channel.bot_user_id, &text, None)
            .await
        {
            warn!("[Announcements] send of #{} failed: {}", index, e);
            return TickOutcome::SendFailed { index };
        }

        {
            let mut st = self.state.lock();
            let clock = Instant::now();
            st.next_global = Some(deadline_after(clock, cfg.min_gap()));
            // a config swapped in during the send owns a new message list
            if Arc::ptr_eq(&cfg, &self.config.read()) {
                st.last_index = Some(index);
                st.next_per_message
                    .insert(index, deadline_after(clock, cfg.messages[index].min_interval()));
            }
        }
        info!("[Announcements] sent #{}: {}", index, text);
        TickOutcome::Sent { index }
    }
}

/// Messages whose own interval has elapsed, minus the previous pick when
/// there is more than one message to choose from.
fn eligible_indices(
    messages: &[AnnouncementMessage],
    next_per_message: &HashMap<usize, Instant>,
    last_index: Option<usize>,
    now: Instant,
) -> Vec<usize> {
    (0..messages.len())
        .filter(|i| !(messages.len() > 1 && last_index == Some(*i)))
        .filter(|i| next_per_message.get(i).is_none_or(|t| now >= *t))
        .collect()
}

/// Weighted draw over `eligible`: roll in `[0, total)`, first cumulative
/// weight above the roll wins.
pub fn pick_message_index<R: Rng + ?Sized>(
    messages: &[AnnouncementMessage],
    eligible: &[usize],
    rng: &mut R,
) -> Option<usize> {
    let total: u64 = eligible.iter().map(|&i| messages[i].effective_weight()).sum();
    if total == 0 {
        return None;
    }

    let roll = rng.random_range(0..total);
    let mut acc = 0;
    for &i in eligible {
        acc += messages[i].effective_weight();
        if roll < acc {
            return Some(i);
        }
    }
    eligible.first().copied()
}

/// Unparsable times or an unknown zone mean "not quiet".
pub fn in_quiet_hours(quiet: &QuietHoursConfig, now: DateTime<Utc>) -> bool {
    let (Some(start), Some(end)) = (parse_hhmm(&quiet.start), parse_hhmm(&quiet.end)) else {
        return false;
    };
    let Ok(tz) = quiet.timezone.parse::<Tz>() else {
        return false;
    };

    let t = now.with_timezone(&tz).time();
    if start <= end {
        start <= t && t < end
    } else {
        t >= start || t < end
    }
}
