use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attendance status of the device owner for a calendar event.
/// Only `Accepted` events participate in the focus computation; the
/// rest are retained in the cache untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Acceptance {
    Accepted,
    Declined,
    Tentative,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub acceptance: Acceptance,
}

impl CalendarEvent {
    pub fn validate(&self) -> Result<(), String> {
        if self.end <= self.start {
            return Err("event.end must be after event.start".to_string());
        }
        Ok(())
    }

    pub fn is_accepted(&self) -> bool {
        self.acceptance == Acceptance::Accepted
    }
}

/// The most recently fetched events plus the fetch timestamp. Replaced
/// wholesale on every successful API refresh, never merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventCache {
    pub events: Vec<CalendarEvent>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl EventCache {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the replacement cache. Events are stored sorted by start;
    /// the sort is stable so events sharing a start keep fetch order.
    pub fn replace(mut events: Vec<CalendarEvent>, fetched_at: DateTime<Utc>) -> Self {
        events.sort_by_key(|event| event.start);
        Self {
            events,
            fetched_at: Some(fetched_at),
        }
    }
}

/// The persisted wake-state. This is the single value that survives a
/// deep-sleep power cycle; the control loop owns it and threads it
/// through every pass explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshState {
    pub last_api_refresh_at: Option<DateTime<Utc>>,
    pub last_full_refresh_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub auth_expired: bool,
    pub cache: EventCache,
}

impl RefreshState {
    /// First boot and corrupt-store recovery both start here. `None`
    /// timestamps count as infinitely overdue, so the next wake
    /// escalates to the full + API path without special-casing.
    pub fn first_boot() -> Self {
        Self::default()
    }

    /// A successful fetch sets the cache and `last_api_refresh_at`
    /// together from the same instant, and clears any pending
    /// re-authorization indicator.
    pub fn record_api_refresh(&mut self, now: DateTime<Utc>, events: Vec<CalendarEvent>) {
        self.cache = EventCache::replace(events, now);
        self.last_api_refresh_at = Some(now);
        self.auth_expired = false;
    }

    pub fn record_full_redraw(&mut self, now: DateTime<Utc>) {
        self.last_full_refresh_at = Some(now);
    }
}

/// Why the device woke up, read once per wake by the boot sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeTrigger {
    TimerExpired,
    ButtonPressed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockReading {
    pub label: String,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusView {
    Focus {
        minutes: i64,
        countdown: String,
        title: String,
        starts_at: String,
    },
    Evening {
        message: String,
        subtext: String,
    },
}

/// Everything the renderer needs for one frame. Recomputed from scratch
/// every wake, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModel {
    pub clocks: Vec<ClockReading>,
    pub focus: FocusView,
    pub battery_percent: Option<u8>,
    pub needs_reauth: bool,
}
