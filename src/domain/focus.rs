use crate::domain::clocks::format_12h;
use crate::domain::models::{EventCache, FocusView};
use chrono::{DateTime, Days, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

pub const EVENING_MESSAGE: &str = "Remember your priorities";
pub const EVENING_SUBTEXT: &str = "No meetings until tomorrow";

/// Derives the "can I focus" message from accepted events and the
/// current time. Pure: identical `(now, cache)` inputs always produce
/// identical output.
#[derive(Debug, Clone)]
pub struct FocusCalculator {
    zone: Tz,
    evening_threshold: NaiveTime,
}

impl FocusCalculator {
    pub fn new(zone: Tz, evening_threshold: NaiveTime) -> Self {
        Self {
            zone,
            evening_threshold,
        }
    }

    /// True once the local time-of-day reaches the evening threshold.
    pub fn is_evening(&self, now: DateTime<Utc>) -> bool {
        now.with_timezone(&self.zone).time() >= self.evening_threshold
    }

    pub fn view(&self, now: DateTime<Utc>, cache: &EventCache) -> FocusView {
        let midnight = next_local_midnight(now, self.zone);

        // Events are stored sorted by start, so the first accepted
        // future event is the earliest; ties keep stored order. An
        // in-progress meeting (start <= now <= end) is deliberately
        // skipped: the display counts down to the next distinct
        // future meeting, not the end of an ongoing one.
        let upcoming = cache
            .events
            .iter()
            .find(|event| event.is_accepted() && event.start >= now);

        match upcoming {
            Some(event) if event.start < midnight => {
                let minutes = (event.start - now).num_minutes().max(0);
                FocusView::Focus {
                    minutes,
                    countdown: format_focus_duration(minutes),
                    title: event.title.clone(),
                    starts_at: self.format_local(event.start),
                }
            }
            // Nothing accepted remains before the next local midnight.
            // The verdict reads the same on either side of the evening
            // threshold: the display substitutes the evening message
            // rather than counting down to a meeting that is not today.
            _ => FocusView::Evening {
                message: EVENING_MESSAGE.to_string(),
                subtext: EVENING_SUBTEXT.to_string(),
            },
        }
    }

    fn format_local(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.zone);
        format_12h(local.hour(), local.minute())
    }
}

/// Formats a focus duration: "4h 19min" from one hour up, "19min"
/// below, "0min" under a minute. Minutes are rounded down.
pub fn format_focus_duration(minutes: i64) -> String {
    let minutes = minutes.max(0);
    if minutes >= 60 {
        format!("{}h {}min", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}min")
    }
}

/// The midnight that ends the current local day, as a UTC instant.
fn next_local_midnight(now: DateTime<Utc>, zone: Tz) -> DateTime<Utc> {
    let local_date = now.with_timezone(&zone).date_naive();
    let midnight = (local_date + Days::new(1)).and_time(NaiveTime::MIN);
    zone.from_local_datetime(&midnight)
        .earliest()
        .map(|at| at.with_timezone(&Utc))
        // A DST gap exactly at midnight has no local representation;
        // a 24-hour horizon is close enough for a day boundary.
        .unwrap_or_else(|| now + chrono::Duration::hours(24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{Acceptance, CalendarEvent};
    use proptest::prelude::*;

    const ZONE: Tz = chrono_tz::Europe::Madrid;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn event(title: &str, start: &str, end: &str, acceptance: Acceptance) -> CalendarEvent {
        CalendarEvent {
            title: title.to_string(),
            start: fixed_time(start),
            end: fixed_time(end),
            acceptance,
        }
    }

    fn cache_of(events: Vec<CalendarEvent>) -> EventCache {
        EventCache::replace(events, fixed_time("2026-03-05T08:00:00Z"))
    }

    fn calculator() -> FocusCalculator {
        FocusCalculator::new(ZONE, NaiveTime::from_hms_opt(19, 0, 0).expect("valid time"))
    }

    #[test]
    fn counts_down_to_the_next_accepted_meeting() {
        // 14:00 local Madrid (13:00Z, CET); meeting at 18:19 local.
        let now = fixed_time("2026-03-05T13:00:00Z");
        let cache = cache_of(vec![event(
            "Product sync",
            "2026-03-05T17:19:00Z",
            "2026-03-05T18:00:00Z",
            Acceptance::Accepted,
        )]);

        let view = calculator().view(now, &cache);
        assert_eq!(
            view,
            FocusView::Focus {
                minutes: 259,
                countdown: "4h 19min".to_string(),
                title: "Product sync".to_string(),
                starts_at: "6:19 PM".to_string(),
            }
        );
    }

    #[test]
    fn evening_verdict_when_nothing_remains_today() {
        // 19:30 local; the only accepted event is tomorrow at 09:00.
        let now = fixed_time("2026-03-05T18:30:00Z");
        let cache = cache_of(vec![event(
            "Morning planning",
            "2026-03-06T08:00:00Z",
            "2026-03-06T09:00:00Z",
            Acceptance::Accepted,
        )]);

        let view = calculator().view(now, &cache);
        assert_eq!(
            view,
            FocusView::Evening {
                message: EVENING_MESSAGE.to_string(),
                subtext: EVENING_SUBTEXT.to_string(),
            }
        );
    }

    #[test]
    fn evening_verdict_also_applies_before_the_threshold() {
        // 15:00 local, still work hours, but today's schedule is done.
        let now = fixed_time("2026-03-05T14:00:00Z");
        let cache = cache_of(vec![event(
            "Tomorrow standup",
            "2026-03-06T08:00:00Z",
            "2026-03-06T08:15:00Z",
            Acceptance::Accepted,
        )]);

        assert!(!calculator().is_evening(now));
        assert!(matches!(
            calculator().view(now, &cache),
            FocusView::Evening { .. }
        ));
    }

    #[test]
    fn evening_verdict_with_an_empty_cache() {
        let now = fixed_time("2026-03-05T18:30:00Z");
        assert!(matches!(
            calculator().view(now, &EventCache::empty()),
            FocusView::Evening { .. }
        ));
    }

    #[test]
    fn declined_and_tentative_events_are_ignored() {
        let now = fixed_time("2026-03-05T13:00:00Z");
        let cache = cache_of(vec![
            event(
                "Declined all-hands",
                "2026-03-05T14:00:00Z",
                "2026-03-05T15:00:00Z",
                Acceptance::Declined,
            ),
            event(
                "Maybe coffee",
                "2026-03-05T15:00:00Z",
                "2026-03-05T15:30:00Z",
                Acceptance::Tentative,
            ),
            event(
                "Real meeting",
                "2026-03-05T16:00:00Z",
                "2026-03-05T17:00:00Z",
                Acceptance::Accepted,
            ),
        ]);

        match calculator().view(now, &cache) {
            FocusView::Focus { title, .. } => assert_eq!(title, "Real meeting"),
            other => panic!("expected focus view, got {other:?}"),
        }
    }

    #[test]
    fn in_progress_meeting_is_skipped_for_the_next_future_one() {
        // A meeting started at 12:30Z and runs until 14:00Z; now is
        // 13:00Z. The countdown targets the 15:00Z meeting instead.
        let now = fixed_time("2026-03-05T13:00:00Z");
        let cache = cache_of(vec![
            event(
                "Ongoing workshop",
                "2026-03-05T12:30:00Z",
                "2026-03-05T14:00:00Z",
                Acceptance::Accepted,
            ),
            event(
                "Next sync",
                "2026-03-05T15:00:00Z",
                "2026-03-05T15:30:00Z",
                Acceptance::Accepted,
            ),
        ]);

        match calculator().view(now, &cache) {
            FocusView::Focus { title, minutes, .. } => {
                assert_eq!(title, "Next sync");
                assert_eq!(minutes, 120);
            }
            other => panic!("expected focus view, got {other:?}"),
        }
    }

    #[test]
    fn tie_break_picks_the_first_stored_event() {
        let now = fixed_time("2026-03-05T13:00:00Z");
        let cache = cache_of(vec![
            event(
                "First of two",
                "2026-03-05T15:00:00Z",
                "2026-03-05T16:00:00Z",
                Acceptance::Accepted,
            ),
            event(
                "Second of two",
                "2026-03-05T15:00:00Z",
                "2026-03-05T15:30:00Z",
                Acceptance::Accepted,
            ),
        ]);

        match calculator().view(now, &cache) {
            FocusView::Focus { title, .. } => assert_eq!(title, "First of two"),
            other => panic!("expected focus view, got {other:?}"),
        }
    }

    #[test]
    fn a_meeting_starting_now_reads_zero_minutes() {
        let now = fixed_time("2026-03-05T13:00:00Z");
        let cache = cache_of(vec![event(
            "Right now",
            "2026-03-05T13:00:30Z",
            "2026-03-05T14:00:00Z",
            Acceptance::Accepted,
        )]);

        match calculator().view(now, &cache) {
            FocusView::Focus {
                minutes, countdown, ..
            } => {
                assert_eq!(minutes, 0);
                assert_eq!(countdown, "0min");
            }
            other => panic!("expected focus view, got {other:?}"),
        }
    }

    #[test]
    fn format_focus_duration_boundaries() {
        assert_eq!(format_focus_duration(0), "0min");
        assert_eq!(format_focus_duration(59), "59min");
        assert_eq!(format_focus_duration(60), "1h 0min");
        assert_eq!(format_focus_duration(259), "4h 19min");
        assert_eq!(format_focus_duration(-5), "0min");
    }

    proptest! {
        // Pure function: same inputs, same output.
        #[test]
        fn view_is_idempotent(
            start_min in 0i64..2880,
            now_min in 0i64..1440,
        ) {
            let base = fixed_time("2026-03-05T00:00:00Z");
            let now = base + chrono::Duration::minutes(now_min);
            let cache = cache_of(vec![CalendarEvent {
                title: "evt".to_string(),
                start: base + chrono::Duration::minutes(start_min),
                end: base + chrono::Duration::minutes(start_min + 30),
                acceptance: Acceptance::Accepted,
            }]);

            let calculator = calculator();
            prop_assert_eq!(calculator.view(now, &cache), calculator.view(now, &cache));
        }
    }

    proptest! {
        // Spec property: no accepted future event today and past the
        // threshold always yields the evening verdict.
        #[test]
        fn past_threshold_with_empty_day_is_evening(minutes_past_19 in 0i64..(5 * 60)) {
            // 19:00 local on 2026-03-05 is 18:00Z.
            let now = fixed_time("2026-03-05T18:00:00Z") + chrono::Duration::minutes(minutes_past_19);
            let calculator = calculator();
            prop_assert!(calculator.is_evening(now));
            let is_evening_view = matches!(
                calculator.view(now, &EventCache::empty()),
                FocusView::Evening { .. }
            );
            prop_assert!(is_evening_view);
        }
    }
}
