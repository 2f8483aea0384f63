use std::time::Duration;

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, Utc};
use tokio::time::Instant;

use spiffybot_common::models::MAX_WINDOW;

/// `now + window`, saturating at the configured ceiling instead of panicking.
pub fn deadline_after(now: Instant, window: Duration) -> Instant {
    now.checked_add(window.min(MAX_WINDOW))
        .or_else(|| now.checked_add(MAX_WINDOW))
        .unwrap_or(now)
}

/// `HH:MM:SS` with the hour count allowed to exceed 24.
pub fn format_uptime(started_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - started_at).num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Calendar-accurate age such as `2y 3m 4d`. Zero parts are skipped, but the
/// day part is always present when nothing else is.
pub fn format_follow_age(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let mut start = since.date_naive();
    let end = now.date_naive();

    let mut years = 0;
    while let Some(next) = start.checked_add_months(Months::new(12)) {
        if next > end {
            break;
        }
        start = next;
        years += 1;
    }
    let mut months = 0;
    while let Some(next) = start.checked_add_months(Months::new(1)) {
        if next > end {
            break;
        }
        start = next;
        months += 1;
    }
    let days = (end - start).num_days().max(0);

    let mut parts = Vec::new();
    if years > 0 {
        parts.push(format!("{years}y"));
    }
    if months > 0 {
        parts.push(format!("{months}m"));
    }
    if days > 0 || parts.is_empty() {
        parts.push(format!("{days}d"));
    }
    parts.join(" ")
}

/// Parses a 24h `HH:mm` (or `HH:mm:ss`) wall-clock time.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Days from `today` until the next 25 December (0 on the day itself).
pub fn days_until_christmas(today: NaiveDate) -> i64 {
    let this_year = NaiveDate::from_ymd_opt(today.year(), 12, 25);
    let target = match this_year {
        Some(d) if today <= d => Some(d),
        _ => NaiveDate::from_ymd_opt(today.year() + 1, 12, 25),
    };
    target.map(|t| (t - today).num_days()).unwrap_or_default()
}
