//! Boundary towards the rendering layer.
//!
//! The core never looks up UI elements; it pushes display updates through
//! [`ViewSink`] and the host decides how to draw them.

use log::info;
use serde::Serialize;

use crate::timer::SessionState;

/// Default on-screen duration for notification banners.
pub const NOTIFICATION_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsView {
    pub sessions_today: u32,
    pub focus_time: String,
    pub streak: u32,
}

pub trait ViewSink: Send + Sync {
    fn display_notification(&self, message: &str, duration_ms: u64);
    fn display_stats(&self, stats: &StatsView);
    fn display_time(&self, clock: &str);
    fn display_progress(&self, fraction: f64);
}

/// `mm:ss`, minutes unbounded.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// `45m`, `2h` or `1h 05m`.
pub fn format_focus_time(minutes: u32) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m:02}m"),
    }
}

pub fn stats_view(state: &SessionState) -> StatsView {
    StatsView {
        sessions_today: state.sessions_today,
        focus_time: format_focus_time(state.focus_minutes_today),
        streak: state.streak_days,
    }
}

/// Pushes the countdown-related parts of `state`.
pub fn render_countdown(view: &dyn ViewSink, state: &SessionState) {
    view.display_time(&format_clock(state.time_left_secs));
    view.display_progress(state.progress());
}

pub fn render_all(view: &dyn ViewSink, state: &SessionState) {
    render_countdown(view, state);
    view.display_stats(&stats_view(state));
}

/// Headless view that writes every update to the log.
pub struct LogView;

impl ViewSink for LogView {
    fn display_notification(&self, message: &str, _duration_ms: u64) {
        info!("[notice] {message}");
    }

    fn display_stats(&self, stats: &StatsView) {
        info!(
            "[stats] sessions={} focus={} streak={}",
            stats.sessions_today, stats.focus_time, stats.streak
        );
    }

    fn display_time(&self, clock: &str) {
        log::debug!("[time] {clock}");
    }

    fn display_progress(&self, _fraction: f64) {}
}
