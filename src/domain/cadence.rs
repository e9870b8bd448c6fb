use crate::domain::models::{RefreshState, WakeTrigger};
use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Development-mode overrides: short time-only ticks and a one-minute
/// API interval. The full-refresh interval is left alone so ghosting
/// clears at the production rate even while iterating.
const DEV_TIME_ONLY_SECS: i64 = 30;
const DEV_API_REFRESH_SECS: i64 = 60;

/// Time-of-day window plus day-of-week set defining "work hours".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkHours {
    pub start: String,
    pub end: String,
    pub days: Vec<String>,
}

impl WorkHours {
    pub fn validate(&self) -> Result<(), String> {
        validate_hhmm(&self.start, "workHours.start")?;
        validate_hhmm(&self.end, "workHours.end")?;
        if self.days.is_empty() {
            return Err("workHours.days must not be empty".to_string());
        }
        for day in &self.days {
            if weekday_from_name(day).is_none() {
                return Err(format!("workHours.days[] has unknown day '{day}'"));
            }
        }
        Ok(())
    }

    fn contains(&self, local: DateTime<Tz>) -> bool {
        let Some(start) = parse_hhmm(&self.start) else {
            return false;
        };
        let Some(end) = parse_hhmm(&self.end) else {
            return false;
        };

        let day = weekday_name(local.weekday());
        let is_active_day = self
            .days
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(day));
        if !is_active_day {
            return false;
        }

        let current = local.time();
        if start <= end {
            current >= start && current < end
        } else {
            current >= start || current < end
        }
    }
}

/// Raw cadence constants as configured, before development-mode
/// overrides are applied.
#[derive(Debug, Clone)]
pub struct CadenceSettings {
    pub work_hours: WorkHours,
    pub time_only_interval_work: Duration,
    pub time_only_interval_off: Duration,
    pub api_refresh_interval: Duration,
    pub full_refresh_interval: Duration,
    pub development_mode: bool,
}

/// What a single wake must do. The full and API clocks are evaluated
/// independently: a full redraw firing never suppresses an overdue API
/// refresh, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakePlan {
    pub full_redraw: bool,
    pub api_refresh: bool,
}

impl WakePlan {
    pub fn tier(self) -> RefreshTier {
        if self.full_redraw {
            RefreshTier::Full
        } else if self.api_refresh {
            RefreshTier::Api
        } else {
            RefreshTier::TimeOnly
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTier {
    TimeOnly,
    Api,
    Full,
}

impl RefreshTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TimeOnly => "time_only",
            Self::Api => "api",
            Self::Full => "full",
        }
    }
}

/// The per-wake decision engine. Pure: every method takes the current
/// time and persisted state explicitly, nothing is read ambiently.
#[derive(Debug, Clone)]
pub struct CadencePolicy {
    zone: Tz,
    work_hours: WorkHours,
    time_only_interval_work: Duration,
    time_only_interval_off: Duration,
    api_refresh_interval: Duration,
    full_refresh_interval: Duration,
    development_mode: bool,
}

impl CadencePolicy {
    pub fn new(zone: Tz, settings: CadenceSettings) -> Self {
        let (time_only_work, time_only_off, api_interval) = if settings.development_mode {
            (
                Duration::seconds(DEV_TIME_ONLY_SECS),
                Duration::seconds(DEV_TIME_ONLY_SECS),
                Duration::seconds(DEV_API_REFRESH_SECS),
            )
        } else {
            (
                settings.time_only_interval_work,
                settings.time_only_interval_off,
                settings.api_refresh_interval,
            )
        };

        Self {
            zone,
            work_hours: settings.work_hours,
            time_only_interval_work: time_only_work,
            time_only_interval_off: time_only_off,
            api_refresh_interval: api_interval,
            full_refresh_interval: settings.full_refresh_interval,
            development_mode: settings.development_mode,
        }
    }

    pub fn api_refresh_interval(&self) -> Duration {
        self.api_refresh_interval
    }

    pub fn full_refresh_interval(&self) -> Duration {
        self.full_refresh_interval
    }

    /// Work-hours classification in the reference zone. Development
    /// mode forces work-hours behavior regardless of wall-clock time.
    pub fn is_work_hours(&self, now: DateTime<Utc>) -> bool {
        if self.development_mode {
            return true;
        }
        self.work_hours.contains(now.with_timezone(&self.zone))
    }

    /// Tier selection. A missing timestamp (first boot, corrupt-store
    /// recovery) counts as overdue. A button wake escalates both
    /// clocks at once.
    pub fn plan_wake(
        &self,
        now: DateTime<Utc>,
        state: &RefreshState,
        trigger: WakeTrigger,
    ) -> WakePlan {
        let button = trigger == WakeTrigger::ButtonPressed;
        WakePlan {
            full_redraw: button
                || interval_elapsed(now, state.last_full_refresh_at, self.full_refresh_interval),
            api_refresh: button
                || interval_elapsed(now, state.last_api_refresh_at, self.api_refresh_interval),
        }
    }

    /// Sleep until the next wake: the time-only interval for the
    /// current work-hours classification, shortened so the wake lands
    /// no later than the next escalation deadline still in the future.
    /// An overdue deadline (a failed API refresh left its clock
    /// un-advanced) does not shorten the sleep — the retry waits out a
    /// normal tick instead of spinning.
    pub fn next_sleep(&self, now: DateTime<Utc>, state: &RefreshState) -> Duration {
        let mut sleep = if self.is_work_hours(now) {
            self.time_only_interval_work
        } else {
            self.time_only_interval_off
        };

        let deadlines = [
            state
                .last_api_refresh_at
                .map(|at| at + self.api_refresh_interval),
            state
                .last_full_refresh_at
                .map(|at| at + self.full_refresh_interval),
        ];
        for deadline in deadlines.into_iter().flatten() {
            if deadline > now {
                sleep = sleep.min(deadline - now);
            }
        }
        sleep
    }
}

fn interval_elapsed(now: DateTime<Utc>, since: Option<DateTime<Utc>>, interval: Duration) -> bool {
    match since {
        Some(at) => now - at >= interval,
        None => true,
    }
}

pub(crate) fn validate_hhmm(value: &str, field_name: &str) -> Result<(), String> {
    parse_hhmm(value)
        .map(|_| ())
        .ok_or_else(|| format!("{field_name} must be HH:MM"))
}

pub(crate) fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}
