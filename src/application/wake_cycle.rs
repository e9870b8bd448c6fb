use crate::domain::battery::percentage_from_voltage;
use crate::domain::cadence::{CadencePolicy, RefreshTier};
use crate::domain::clocks::{WorldClock, world_clock_readings};
use crate::domain::focus::FocusCalculator;
use crate::domain::models::{RefreshState, ViewModel, WakeTrigger};
use crate::infrastructure::clock::ClockSource;
use crate::infrastructure::display::DisplayDriver;
use crate::infrastructure::error::CalendarError;
use crate::infrastructure::google_calendar::CalendarSource;
use crate::infrastructure::refresh_state_repository::RefreshStateRepository;
use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

/// Outcome of one wake pass, handed back to the boot sequence so it
/// can suspend for the computed duration.
#[derive(Debug, Clone)]
pub struct WakeSummary {
    pub tier: RefreshTier,
    pub sleep_for: Duration,
    pub view: ViewModel,
}

/// One pass of the control loop per wake: restore state, pick a tier,
/// run the network work that tier requires, derive the frame, draw,
/// compute the next sleep, persist, and hand control back to suspend.
/// Stages run strictly in that order; each one's output feeds the
/// next.
pub struct WakeCycleService<K, C, P, D>
where
    K: ClockSource,
    C: CalendarSource,
    P: RefreshStateRepository,
    D: DisplayDriver,
{
    clock: Arc<K>,
    calendar: Arc<C>,
    state_repository: Arc<P>,
    display: Arc<D>,
    policy: CadencePolicy,
    focus: FocusCalculator,
    clocks: Vec<WorldClock>,
    zone: Tz,
}

impl<K, C, P, D> WakeCycleService<K, C, P, D>
where
    K: ClockSource,
    C: CalendarSource,
    P: RefreshStateRepository,
    D: DisplayDriver,
{
    pub fn new(
        clock: Arc<K>,
        calendar: Arc<C>,
        state_repository: Arc<P>,
        display: Arc<D>,
        policy: CadencePolicy,
        focus: FocusCalculator,
        clocks: Vec<WorldClock>,
        zone: Tz,
    ) -> Self {
        Self {
            clock,
            calendar,
            state_repository,
            display,
            policy,
            focus,
            clocks,
            zone,
        }
    }

    /// Runs one wake to completion. Never fails: every failure mode
    /// degrades to drawing last-known-good data, so the device always
    /// reaches "sleep again".
    pub async fn run_wake(&self, trigger: WakeTrigger) -> WakeSummary {
        let mut state = self.restore_state();

        let now = self.clock.now();
        let plan = self.policy.plan_wake(now, &state, trigger);
        let button = trigger == WakeTrigger::ButtonPressed;
        tracing::info!(tier = plan.tier().as_str(), button, "wake");

        if plan.api_refresh {
            self.run_api_tier(&mut state).await;
        }

        // Re-read the clock: the API tier may have corrected it.
        let now = self.clock.now();
        if plan.full_redraw {
            state.record_full_redraw(now);
        }

        let view = self.view_model(now, &state);
        self.display.draw(&view, plan.full_redraw);

        let sleep_for = self.policy.next_sleep(now, &state);
        tracing::debug!(
            sleep_secs = sleep_for.num_seconds(),
            evening = self.focus.is_evening(now),
            "pass complete"
        );

        if let Err(error) = self.state_repository.commit(&state) {
            // A missed write risks redundant work on the next wake,
            // not loss of anything externally visible.
            tracing::error!(%error, "refresh state commit failed");
        }

        WakeSummary {
            tier: plan.tier(),
            sleep_for,
            view,
        }
    }

    fn restore_state(&self) -> RefreshState {
        match self.state_repository.restore() {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::info!("no persisted state; starting from first boot");
                RefreshState::first_boot()
            }
            Err(error) => {
                tracing::warn!(%error, "persisted state unusable; treating as first boot");
                RefreshState::first_boot()
            }
        }
    }

    /// The API tier: time sync then calendar fetch. A sync failure is
    /// tolerated and does not abort the fetch; a fetch failure leaves
    /// the state untouched so the normal cadence retries it.
    async fn run_api_tier(&self, state: &mut RefreshState) {
        if let Err(error) = self.clock.sync().await {
            tracing::warn!(%error, "time sync failed; tolerating drift until the next refresh");
        }

        let now = self.clock.now();
        let (range_start, range_end) = self.fetch_range(now);
        match self.calendar.fetch_events(range_start, range_end).await {
            Ok(events) => {
                tracing::info!(count = events.len(), "calendar refreshed");
                state.record_api_refresh(now, events);
            }
            Err(CalendarError::AuthExpired(reason)) => {
                tracing::warn!(%reason, "calendar authorization expired; flagging for re-auth");
                state.auth_expired = true;
            }
            Err(error) => {
                tracing::warn!(%error, "calendar fetch failed; serving cached events this wake");
            }
        }
    }

    /// Start of the current local day through the midnight that ends
    /// tomorrow.
    fn fetch_range(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let local_date = now.with_timezone(&self.zone).date_naive();
        (
            self.local_midnight(local_date),
            self.local_midnight(local_date + Days::new(2)),
        )
    }

    fn local_midnight(&self, date: NaiveDate) -> DateTime<Utc> {
        let naive = date.and_time(NaiveTime::MIN);
        match self.zone.from_local_datetime(&naive).earliest() {
            Some(at) => at.with_timezone(&Utc),
            // A DST gap at midnight; the UTC anchor is close enough
            // for a fetch window boundary.
            None => Utc.from_utc_datetime(&naive),
        }
    }

    fn view_model(&self, now: DateTime<Utc>, state: &RefreshState) -> ViewModel {
        ViewModel {
            clocks: world_clock_readings(now, &self.clocks),
            focus: self.focus.view(now, &state.cache),
            battery_percent: self
                .display
                .battery_voltage()
                .map(percentage_from_voltage),
            needs_reauth: state.auth_expired,
        }
    }
}
