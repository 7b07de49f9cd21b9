//! Human-readable rendering of session state.

use crate::session::{Session, SessionStatus};
use chrono::{Duration, NaiveDateTime};

const BAR_WIDTH: usize = 30;

pub fn format_date(date: NaiveDateTime) -> String {
    date.format("%d-%m-%Y %H:%M:%S").to_string()
}

/// Whole hours and minutes; seconds are dropped
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    format!("{} hours, {} minutes", hours, minutes)
}

fn progress_bar(percent: u8) -> String {
    let filled = (usize::from(percent) * BAR_WIDTH + 50) / 100;
    format!(
        "{}{} {:>3}%",
        "█".repeat(filled),
        "░".repeat(BAR_WIDTH - filled),
        percent
    )
}

/// Multi-line session summary as seen at `now`
pub fn format_session_info(session: &Session, now: NaiveDateTime) -> String {
    let mut lines = vec![
        "Session:".to_string(),
        format!("  Started:   {}", format_date(session.created_at)),
        format!("  Expires:   {}", format_date(session.expires_at)),
        format!("  Status:    {}", session.status),
    ];

    if session.expires_at > session.created_at {
        lines.push(format!(
            "  Progress:  {}",
            progress_bar(session.progress_at(now))
        ));
    }

    if session.status == SessionStatus::Active && session.is_active_at(now) {
        lines.push(format!(
            "  Remaining: {}",
            format_duration(session.remaining_at(now))
        ));
    }

    lines.join("\n")
}

pub fn success(message: &str) -> String {
    format!("✓ {}", message)
}

pub fn failure(message: &str) -> String {
    format!("✗ {}", message)
}
