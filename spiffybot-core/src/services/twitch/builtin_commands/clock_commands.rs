use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::utils::time::days_until_christmas;

pub fn handle_time(tz: Tz, now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&tz);
    format!("Current time ({}): {}", tz.name(), local.format("%Y-%m-%d %H:%M:%S"))
}

pub fn handle_xmas(tz: Tz, now: DateTime<Utc>) -> String {
    let today = now.with_timezone(&tz).date_naive();
    match days_until_christmas(today) {
        0 => "🎄 It's Christmas today! 🎁".to_string(),
        1 => "🎄 There is 1 day to Christmas! 🎅".to_string(),
        days => format!("🎄 There are {days} days to Christmas! 🎅"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_is_rendered_in_the_configured_zone() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        assert_eq!(
            handle_time(chrono_tz::Europe::London, now),
            "Current time (Europe/London): 2024-07-01 13:00:00"
        );
    }

    #[test]
    fn xmas_uses_local_date() {
        // 23:30 UTC on the 24th is already Christmas Day in Tokyo
        let now = Utc.with_ymd_and_hms(2024, 12, 24, 23, 30, 0).unwrap();
        assert_eq!(handle_xmas(chrono_tz::Asia::Tokyo, now), "🎄 It's Christmas today! 🎁");
        assert_eq!(handle_xmas(chrono_tz::UTC, now), "🎄 There is 1 day to Christmas! 🎅");
    }
}
