// File: spiffybot-common/src/models/events_config.rs
//! Announcement policy for EventSub notifications (`events.json`).

use std::time::Duration;
use serde::{Deserialize, Serialize};

/// Floor for the global cross-category gap between announcements.
pub const MIN_RATE_LIMIT_SECS: f64 = 0.2;

/// Ceiling for every configured window (ten years). Larger values mean "never again".
pub const MAX_WINDOW: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventsConfig {
    pub rate_limit_seconds: f64,
    pub follows: FollowsConfig,
    pub subs: SubsConfig,
    pub bits: BitsConfig,
    pub raids: RaidsConfig,
    pub redemptions: RedemptionsConfig,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            rate_limit_seconds: 1.2,
            follows: FollowsConfig::default(),
            subs: SubsConfig::default(),
            bits: BitsConfig::default(),
            raids: RaidsConfig::default(),
            redemptions: RedemptionsConfig::default(),
        }
    }
}

impl EventsConfig {
    pub fn rate_limit(&self) -> Duration {
        secs_with_floor(self.rate_limit_seconds, MIN_RATE_LIMIT_SECS)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FollowsConfig {
    pub enabled: bool,
    pub cooldown_seconds: u64,
    pub dedupe_window_seconds: u64,
    pub template: String,
    pub batching: FollowBatchingConfig,
}

impl Default for FollowsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cooldown_seconds: 5,
            dedupe_window_seconds: 15,
            template: "❤️ Thanks for the follow, {user.name}!".to_string(),
            batching: FollowBatchingConfig::default(),
        }
    }
}

impl FollowsConfig {
    pub fn cooldown(&self) -> Duration {
        window_secs(self.cooldown_seconds)
    }

    pub fn dedupe_window(&self) -> Duration {
        window_secs(self.dedupe_window_seconds.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FollowBatchingConfig {
    pub enabled: bool,
    pub window_seconds: u64,
    pub template: String,
}

impl Default for FollowBatchingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_seconds: 20,
            template: "❤️ Thanks for the follows: {user.list}".to_string(),
        }
    }
}

impl FollowBatchingConfig {
    pub fn window(&self) -> Duration {
        window_secs(self.window_seconds.max(1))
    }
}

/// Shared by `channel.subscribe` and `channel.subscription.message`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubsConfig {
    pub enabled: bool,
    pub cooldown_seconds: u64,
    pub template_new: String,
    pub template_gift: String,
    pub template_resub: String,
    pub template_message: String,
}

impl Default for SubsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_seconds: 3,
            template_new: "🎉 {user.name} just subscribed at {sub.tier}!".to_string(),
            template_gift: "🎁 {gifter.name} gifted a sub to {user.name}!".to_string(),
            template_resub: "🔁 {user.name} resubbed ({sub.months} months)!".to_string(),
            template_message: "💬 {user.name}: {message}".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BitsConfig {
    pub enabled: bool,
    pub cooldown_seconds: u64,
    pub template: String,
}

impl Default for BitsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_seconds: 2,
            template: "✨ {user.name} cheered {bits.amount} bits!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RaidsConfig {
    pub enabled: bool,
    pub cooldown_seconds: u64,
    pub template: String,
}

impl Default for RaidsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_seconds: 5,
            template: "🚀 Raid from {raider.name} with {raider.viewers} viewers, welcome in!".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RedemptionsConfig {
    pub enabled: bool,
    pub cooldown_seconds: u64,
    pub template: String,
}

impl Default for RedemptionsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            cooldown_seconds: 2,
            template: "🟣 {user.name} redeemed “{reward.title}”{reward.input}".to_string(),
        }
    }
}

/// Whole seconds from config, capped at [`MAX_WINDOW`].
pub fn window_secs(secs: u64) -> Duration {
    Duration::from_secs(secs).min(MAX_WINDOW)
}

pub(crate) fn secs_with_floor(secs: f64, floor: f64) -> Duration {
    let secs = if secs.is_nan() { floor } else { secs.max(floor) };
    Duration::try_from_secs_f64(secs).map_or(MAX_WINDOW, |d| d.min(MAX_WINDOW))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_apply_to_windows_and_rate_limit() {
        let raw = r#"{
            "rateLimitSeconds": 0.01,
            "follows": { "dedupeWindowSeconds": 0, "batching": { "enabled": true, "windowSeconds": 0 } }
        }"#;
        let cfg: EventsConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.rate_limit(), Duration::from_secs_f64(0.2));
        assert_eq!(cfg.follows.dedupe_window(), Duration::from_secs(1));
        assert_eq!(cfg.follows.batching.window(), Duration::from_secs(1));
        // untouched sections keep their defaults
        assert!(cfg.follows.enabled);
        assert_eq!(cfg.subs.cooldown_seconds, 3);
    }

    #[test]
    fn oversized_values_are_capped() {
        let raw = r#"{
            "rateLimitSeconds": 1e300,
            "follows": { "cooldownSeconds": 18446744073709551615 }
        }"#;
        let cfg: EventsConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.rate_limit(), MAX_WINDOW);
        assert_eq!(cfg.follows.cooldown(), MAX_WINDOW);
        assert_eq!(window_secs(90), Duration::from_secs(90));
    }
}
