// File: spiffybot-core/src/services/twitch/event_announcer.rs
//
// Turns EventSub notifications into chat lines. Every category has its own
// cooldown; all categories share one global send gap that only moves forward.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use spiffybot_common::models::events_config::window_secs;
use spiffybot_common::models::{ChannelIdentity, EventsConfig};
use spiffybot_common::traits::ChatApi;

use crate::platforms::twitch_eventsub::events::{
    CheerEvent, FollowEvent, InboundEvent, RaidEvent, RedemptionEvent, SubscribeEvent,
    SubscriptionMessageEvent,
};
use crate::utils::template::{mask_id, render};
use crate::utils::time::deadline_after;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnounceCategory {
    Follow,
    Subscribe,
    Resub,
    Cheer,
    Raid,
    Redemption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    CategoryCooldown,
    RateLimited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    Disabled,
    /// Same follower seen inside the dedupe window.
    Deduplicated,
    /// Added to the pending follow batch.
    Batched,
    Suppressed(Suppression),
    SendFailed,
    Sent,
}

#[derive(Default)]
struct FollowBatch {
    names: Vec<String>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct AnnouncerState {
    next_send: Option<Instant>,
    category_next: HashMap<AnnounceCategory, Instant>,
    follow_seen: HashMap<String, Instant>,
    batch: FollowBatch,
}

impl AnnouncerState {
    /// Category cooldown first, then the global gap. Both advance on success.
    fn try_gate(
        &mut self,
        category: AnnounceCategory,
        cooldown: Duration,
        gap: Duration,
        now: Instant,
    ) -> Result<(), Suppression> {
        if self.category_next.get(&category).is_some_and(|t| now < *t) {
            return Err(Suppression::CategoryCooldown);
        }
        self.try_rate_limit(gap, now)?;
        self.category_next.insert(category, deadline_after(now, cooldown));
        Ok(())
    }

    fn try_rate_limit(&mut self, gap: Duration, now: Instant) -> Result<(), Suppression> {
        if self.next_send.is_some_and(|t| now < t) {
            return Err(Suppression::RateLimited);
        }
        let candidate = deadline_after(now, gap);
        self.next_send = Some(match self.next_send {
            Some(t) if t > candidate => t,
            _ => candidate,
        });
        Ok(())
    }
}

struct AnnouncerInner {
    api: Arc<dyn ChatApi>,
    channel: ChannelIdentity,
    config: RwLock<Arc<EventsConfig>>,
    state: Mutex<AnnouncerState>,
}

impl AnnouncerInner {
    fn config(&self) -> Arc<EventsConfig> {
        self.config.read().clone()
    }

    async fn send(&self, text: &str, what: &str) -> AnnounceOutcome {
        match self
            .api
            .send_chat_message(&self.channel.broadcaster_id, &self.channel.bot_user_id, text, None)
            .await
        {
            Ok(()) => {
                info!("[Events] {} announced", what);
                AnnounceOutcome::Sent
            }
            Err(e) => {
                warn!("[Events] {} announcement failed: {}", what, e);
                AnnounceOutcome::SendFailed
            }
        }
    }

    /// Runs when the debounce timer of `generation` fires. A newer follow
    /// bumps the generation, which turns a stale timer into a no-op.
    fn flush_follow_batch(self: &Arc<Self>, generation: u64) {
        let cfg = self.config();
        let (names, gate) = {
            let mut st = self.state.lock();
            if st.batch.generation != generation {
                return;
            }
            st.batch.timer = None;
            let names = std::mem::take(&mut st.batch.names);
            if names.is_empty() {
                return;
            }
            if !cfg.follows.enabled || !cfg.follows.batching.enabled {
                debug!("[Events] follow batch of {} dropped, batching is off", names.len());
                return;
            }
            let gate = st.try_rate_limit(cfg.rate_limit(), Instant::now());
            (names, gate)
        };

        if let Err(reason) = gate {
            info!("[Events] follow batch of {} suppressed: {:?}", names.len(), reason);
            return;
        }

        let text = render(&cfg.follows.batching.template, &[("user.list", &names.join(", "))]);
        // the send runs detached so that re-arming the timer can never abort it
        let inner = self.clone();
        tokio::spawn(async move {
            inner.send(&text, "follow batch").await;
        });
    }
}

/// Announces follows, subs, resubs, cheers, raids and redemptions in chat.
#[derive(Clone)]
pub struct EventAnnouncer {
    inner: Arc<AnnouncerInner>,
}

impl EventAnnouncer {
    pub fn new(api: Arc<dyn ChatApi>, channel: ChannelIdentity, config: EventsConfig) -> Self {
        Self {
            inner: Arc::new(AnnouncerInner {
                api,
                channel,
                config: RwLock::new(Arc::new(config)),
                state: Mutex::new(AnnouncerState::default()),
            }),
        }
    }

    /// Replaces the policy. Cooldowns, dedupe entries and a pending batch are kept.
    pub fn set_config(&self, config: EventsConfig) {
        *self.inner.config.write() = Arc::new(config);
    }

    /// Earliest moment the next announcement may go out.
    pub fn next_allowed_send(&self) -> Option<Instant> {
        self.inner.state.lock().next_send
    }

    pub fn pending_follow_batch(&self) -> Vec<String> {
        self.inner.state.lock().batch.names.clone()
    }

    /// Routes any announceable event; chat messages yield `None`.
    pub async fn handle_event(&self, event: &InboundEvent) -> Option<AnnounceOutcome> {
        Some(match event {
            InboundEvent::Follow(ev) => self.handle_follow(ev).await,
            InboundEvent::Subscribe(ev) => self.handle_subscribe(ev).await,
            InboundEvent::SubscriptionMessage(ev) => self.handle_subscription_message(ev).await,
            InboundEvent::Cheer(ev) => self.handle_cheer(ev).await,
            InboundEvent::Raid(ev) => self.handle_raid(ev).await,
            InboundEvent::Redemption(ev) => self.handle_redemption(ev).await,
            InboundEvent::ChatMessage(_) => return None,
        })
    }

    fn gate(&self, category: AnnounceCategory, cooldown_secs: u64, cfg: &EventsConfig) -> Result<(), Suppression> {
        let result = self.inner.state.lock().try_gate(
            category,
            window_secs(cooldown_secs),
            cfg.rate_limit(),
            Instant::now(),
        );
        if let Err(reason) = result {
            debug!("[Events] {:?} suppressed: {:?}", category, reason);
        }
        result
    }

    pub async fn handle_follow(&self, ev: &FollowEvent) -> AnnounceOutcome {
        let cfg = self.inner.config();
        if !cfg.follows.enabled {
            return AnnounceOutcome::Disabled;
        }
        let name = name_or_login(&ev.user_name, &ev.user_login).to_string();

        {
            let mut st = self.inner.state.lock();
            let now = Instant::now();

            let window = cfg.follows.dedupe_window();
            st.follow_seen.retain(|_, seen| now.duration_since(*seen) < window);
            if !ev.user_id.is_empty() {
                if st.follow_seen.contains_key(&ev.user_id) {
                    debug!("[Events] duplicate follow from {} ignored", mask_id(&ev.user_id));
                    return AnnounceOutcome::Deduplicated;
                }
                st.follow_seen.insert(ev.user_id.clone(), now);
            }

            if cfg.follows.batching.enabled {
                if !st.batch.names.iter().any(|n| n.eq_ignore_ascii_case(&name)) {
                    st.batch.names.push(name);
                }
                st.batch.generation += 1;
                let generation = st.batch.generation;
                if let Some(old) = st.batch.timer.take() {
                    old.abort();
                }
                let inner = self.inner.clone();
                let window = cfg.follows.batching.window();
                st.batch.timer = Some(tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    inner.flush_follow_batch(generation);
                }));
                debug!("[Events] follow from {} batched", mask_id(&ev.user_id));
                return AnnounceOutcome::Batched;
            }

            if let Err(reason) = st.try_gate(
                AnnounceCategory::Follow,
                cfg.follows.cooldown(),
                cfg.rate_limit(),
                now,
            ) {
                debug!("[Events] follow from {} suppressed: {:?}", mask_id(&ev.user_id), reason);
                return AnnounceOutcome::Suppressed(reason);
            }
        }

        let text = render(
            &cfg.follows.template,
            &[("user.name", &name), ("user.login", &ev.user_login)],
        );
        self.inner.send(&text, "follow").await
    }

    pub async fn handle_subscribe(&self, ev: &SubscribeEvent) -> AnnounceOutcome {
        let cfg = self.inner.config();
        if !cfg.subs.enabled {
            return AnnounceOutcome::Disabled;
        }
        if let Err(reason) = self.gate(AnnounceCategory::Subscribe, cfg.subs.cooldown_seconds, &cfg) {
            return AnnounceOutcome::Suppressed(reason);
        }

        let name = name_or_login(&ev.user_name, &ev.user_login);
        let tier = tier_label(&ev.tier);
        let text = if ev.is_gift {
            let gifter = ev
                .gifter_user_name
                .as_deref()
                .or(ev.gifter_user_login.as_deref())
                .unwrap_or("An anonymous gifter");
            render(
                &cfg.subs.template_gift,
                &[("gifter.name", gifter), ("user.name", name), ("sub.tier", &tier)],
            )
        } else {
            render(
                &cfg.subs.template_new,
                &[("user.name", name), ("user.login", &ev.user_login), ("sub.tier", &tier)],
            )
        };
        self.inner.send(&text, "subscribe").await
    }

    /// Resub: the resub line, then the viewer's message as a second line when
    /// they wrote one. Both sends belong to one gate decision.
    pub async fn handle_subscription_message(&self, ev: &SubscriptionMessageEvent) -> AnnounceOutcome {
        let cfg = self.inner.config();
        if !cfg.subs.enabled {
            return AnnounceOutcome::Disabled;
        }
        if let Err(reason) = self.gate(AnnounceCategory::Resub, cfg.subs.cooldown_seconds, &cfg) {
            return AnnounceOutcome::Suppressed(reason);
        }

        let name = name_or_login(&ev.user_name, &ev.user_login);
        let months = ev.cumulative_months.to_string();
        let streak = ev.streak_months.unwrap_or_default().to_string();
        let tier = tier_label(&ev.tier);
        let primary = render(
            &cfg.subs.template_resub,
            &[
                ("user.name", name),
                ("user.login", &ev.user_login),
                ("sub.months", &months),
                ("sub.streak", &streak),
                ("sub.tier", &tier),
            ],
        );

        let outcome = self.inner.send(&primary, "resub").await;
        if !ev.message.trim().is_empty() {
            let echo = render(
                &cfg.subs.template_message,
                &[("user.name", name), ("message", ev.message.trim())],
            );
            self.inner.send(&echo, "resub message").await;
        }
        outcome
    }

    pub async fn handle_cheer(&self, ev: &CheerEvent) -> AnnounceOutcome {
        let cfg = self.inner.config();
        if !cfg.bits.enabled {
            return AnnounceOutcome::Disabled;
        }
        if let Err(reason) = self.gate(AnnounceCategory::Cheer, cfg.bits.cooldown_seconds, &cfg) {
            return AnnounceOutcome::Suppressed(reason);
        }

        let name = if ev.is_anonymous {
            "Anonymous"
        } else {
            ev.user_name
                .as_deref()
                .or(ev.user_login.as_deref())
                .unwrap_or("Anonymous")
        };
        let bits = ev.bits.to_string();
        let text = render(
            &cfg.bits.template,
            &[("user.name", name), ("bits.amount", &bits), ("message", ev.message.trim())],
        );
        self.inner.send(&text, "cheer").await
    }

    pub async fn handle_raid(&self, ev: &RaidEvent) -> AnnounceOutcome {
        let cfg = self.inner.config();
        if !cfg.raids.enabled {
            return AnnounceOutcome::Disabled;
        }
        if let Err(reason) = self.gate(AnnounceCategory::Raid, cfg.raids.cooldown_seconds, &cfg) {
            return AnnounceOutcome::Suppressed(reason);
        }

        let viewers = ev.viewers.to_string();
        let text = render(
            &cfg.raids.template,
            &[
                ("raider.name", name_or_login(&ev.from_broadcaster_user_name, &ev.from_broadcaster_user_login)),
                ("raider.login", &ev.from_broadcaster_user_login),
                ("raider.viewers", &viewers),
            ],
        );
        self.inner.send(&text, "raid").await
    }

    pub async fn handle_redemption(&self, ev: &RedemptionEvent) -> AnnounceOutcome {
        let cfg = self.inner.config();
        if !cfg.redemptions.enabled {
            return AnnounceOutcome::Disabled;
        }
        if let Err(reason) = self.gate(AnnounceCategory::Redemption, cfg.redemptions.cooldown_seconds, &cfg) {
            return AnnounceOutcome::Suppressed(reason);
        }

        let input = match ev.user_input.trim() {
            "" => String::new(),
            s => format!(": {s}"),
        };
        let cost = ev.reward_cost.to_string();
        let text = render(
            &cfg.redemptions.template,
            &[
                ("user.name", name_or_login(&ev.user_name, &ev.user_login)),
                ("reward.title", &ev.reward_title),
                ("reward.cost", &cost),
                ("reward.input", &input),
            ],
        );
        self.inner.send(&text, "redemption").await
    }
}

fn name_or_login<'a>(name: &'a str, login: &'a str) -> &'a str {
    if !name.trim().is_empty() {
        name
    } else if !login.trim().is_empty() {
        login
    } else {
        "(someone)"
    }
}

/// "1000" → "Tier 1"; anything unrecognised is shown as-is.
fn tier_label(tier: &str) -> String {
    match tier {
        "1000" | "" => "Tier 1".to_string(),
        "2000" => "Tier 2".to_string(),
        "3000" => "Tier 3".to_string(),
        t if t.eq_ignore_ascii_case("prime") => "Prime".to_string(),
        other => other.to_string(),
    }
}
