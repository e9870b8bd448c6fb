use crate::domain::models::ClockReading;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

/// One configured world clock: a fixed city label and its zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldClock {
    pub label: String,
    pub zone: Tz,
}

/// 12-hour `H:MM AM/PM`, no leading zero on the hour.
pub fn format_12h(hour: u32, minute: u32) -> String {
    let period = if hour < 12 { "AM" } else { "PM" };
    let mut hour_12 = hour % 12;
    if hour_12 == 0 {
        hour_12 = 12;
    }
    format!("{hour_12}:{minute:02} {period}")
}

/// Renders `now` into every configured zone. Stateless and
/// deterministic; DST is the zone database's problem, not ours.
pub fn world_clock_readings(now: DateTime<Utc>, clocks: &[WorldClock]) -> Vec<ClockReading> {
    clocks
        .iter()
        .map(|clock| {
            let local = now.with_timezone(&clock.zone);
            ClockReading {
                label: clock.label.clone(),
                time: format_12h(local.hour(), local.minute()),
            }
        })
        .collect()
}
