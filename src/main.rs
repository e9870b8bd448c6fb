use focusdeck::application::wake_cycle::WakeCycleService;
use focusdeck::domain::cadence::CadencePolicy;
use focusdeck::domain::focus::FocusCalculator;
use focusdeck::domain::models::WakeTrigger;
use focusdeck::infrastructure::clock::HttpClockSource;
use focusdeck::infrastructure::config::{ensure_default_config, load_config, load_secrets};
use focusdeck::infrastructure::display::ConsoleDisplay;
use focusdeck::infrastructure::google_calendar::ReqwestCalendarSource;
use focusdeck::infrastructure::refresh_state_repository::SqliteRefreshStateRepository;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const NETWORK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "focusdeck=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let workspace_root = std::env::current_dir()?;
    let config_dir = workspace_root.join("config");
    ensure_default_config(&config_dir)?;
    let config = load_config(&config_dir)?;
    let secrets = load_secrets(&config_dir)?;

    let zone = config.reference_zone()?;
    let policy = CadencePolicy::new(zone, config.cadence_settings());
    let focus = FocusCalculator::new(zone, config.evening_threshold_time()?);
    let clocks = config.world_clocks()?;
    if config.development_mode {
        tracing::info!("development mode: short cadence, work hours forced");
    }

    let state_dir = workspace_root.join("state");
    std::fs::create_dir_all(&state_dir)?;
    let repository = SqliteRefreshStateRepository::new(state_dir.join("focusdeck.sqlite3"));
    repository.initialize()?;

    let service = WakeCycleService::new(
        Arc::new(HttpClockSource::new(NETWORK_TIMEOUT)),
        Arc::new(ReqwestCalendarSource::new(secrets, zone, NETWORK_TIMEOUT)),
        Arc::new(repository),
        Arc::new(ConsoleDisplay),
        policy,
        focus,
        clocks,
        zone,
    );

    // Host-side stand-in for deep sleep: run a pass, park the task for
    // the computed duration, run the next pass. `--button` makes the
    // first wake behave like a wake-button press.
    let mut trigger = if std::env::args().any(|arg| arg == "--button") {
        WakeTrigger::ButtonPressed
    } else {
        WakeTrigger::TimerExpired
    };

    loop {
        let summary = service.run_wake(trigger).await;
        let sleep_for = summary
            .sleep_for
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        tracing::info!(
            tier = summary.tier.as_str(),
            sleep_secs = sleep_for.as_secs(),
            "suspending"
        );
        tokio::time::sleep(sleep_for).await;
        trigger = WakeTrigger::TimerExpired;
    }
}
