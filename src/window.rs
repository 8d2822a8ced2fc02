//! Voting window classification
//!
//! Pure function of `(match, now)`: no I/O, no mutation. Everything the
//! scheduler decides about timing goes through `classify`, so keeping it
//! side-effect free keeps the state machine testable with frozen clocks.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::Match;

/// Where `now` falls relative to a match's voting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    /// Voting has not opened yet; wait this long until it does
    Pending(Duration),
    /// Voting is open; this much time remains
    Open(Duration),
    /// Voting has ended
    Closed,
    /// Timestamps missing or inconsistent; transient, never fatal
    Unknown,
}

impl WindowState {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

impl std::fmt::Display for WindowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending(wait) => write!(f, "pending (opens in {})", format_duration(*wait)),
            Self::Open(remaining) => write!(f, "open ({} remaining)", format_duration(*remaining)),
            Self::Closed => write!(f, "closed"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify `now` against the match's voting window.
///
/// All comparisons are UTC-to-UTC. A window with either bound missing, or
/// with `voting_start > voting_end`, classifies as `Unknown`.
pub fn classify(m: &Match, now: DateTime<Utc>) -> WindowState {
    let (Some(start), Some(end)) = (m.voting_start, m.voting_end) else {
        return WindowState::Unknown;
    };

    if start > end {
        return WindowState::Unknown;
    }

    if now < start {
        WindowState::Pending((start - now).to_std().unwrap_or_default())
    } else if now <= end {
        WindowState::Open((end - now).to_std().unwrap_or_default())
    } else {
        WindowState::Closed
    }
}

/// Render a duration as `1h 2m 3s` / `2m 3s` / `3s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
