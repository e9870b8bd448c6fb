use crate::domain::models::{FocusView, ViewModel};

/// The e-ink panel boundary. Side-effecting; the contract is only that
/// a draw was attempted. The battery hook lives here because the board
/// exposes its battery reading through the display controller.
pub trait DisplayDriver: Send + Sync {
    fn draw(&self, view: &ViewModel, full_redraw: bool);

    fn battery_voltage(&self) -> Option<f32> {
        None
    }
}

/// Host-side stand-in for the panel: logs the frame instead of driving
/// ink.
#[derive(Debug, Default)]
pub struct ConsoleDisplay;

impl DisplayDriver for ConsoleDisplay {
    fn draw(&self, view: &ViewModel, full_redraw: bool) {
        let mode = if full_redraw { "full" } else { "partial" };
        for clock in &view.clocks {
            tracing::info!(label = %clock.label, time = %clock.time, mode, "clock");
        }
        match &view.focus {
            FocusView::Focus {
                countdown,
                title,
                starts_at,
                ..
            } => {
                tracing::info!(%countdown, %title, %starts_at, mode, "focus");
            }
            FocusView::Evening { message, subtext } => {
                tracing::info!(%message, %subtext, mode, "evening");
            }
        }
        if let Some(percent) = view.battery_percent {
            tracing::info!(percent, "battery");
        }
        if view.needs_reauth {
            tracing::warn!("re-authorization needed");
        }
    }
}
