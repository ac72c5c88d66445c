//! Clock helpers for pomod

use chrono::{DateTime, Local};
use std::time::Duration;

/// Get the current local wall-clock time.
///
/// Session timestamps (`started_at`, `finished_at`) are informational only;
/// the session clock itself advances by ticks, never by reading this.
pub fn now() -> DateTime<Local> {
    Local::now()
}

/// Format a countdown as `MM:SS`, or `H:MM:SS` past one hour.
pub fn format_countdown(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Format a DateTime with full date and time.
pub fn format_datetime_full(dt: &DateTime<Local>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
