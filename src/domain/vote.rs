//! Vote attempt results and cycle summaries

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// Why a vote attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteErrorKind {
    /// Balance below the strategy's required minimum; expected and
    /// recoverable, not a failure of the scheduler
    InsufficientFuel,
    /// The window closed before the vote could be placed
    WindowClosed,
    /// The match carried no votable sides
    NoSides,
    /// The remote service rejected or failed the submission
    Remote(String),
}

impl std::fmt::Display for VoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientFuel => write!(f, "insufficient fuel"),
            Self::WindowClosed => write!(f, "voting window closed"),
            Self::NoSides => write!(f, "no sides available"),
            Self::Remote(msg) => write!(f, "remote error: {}", msg),
        }
    }
}

/// Outcome of one scheduling cycle for one account.
///
/// Emitted once per cycle per account and aggregated by the orchestrator;
/// not persisted beyond the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteAttemptResult {
    pub account_index: usize,
    pub match_id: String,
    pub side_id: Option<String>,
    pub success: bool,
    pub fuel_spent: u32,
    pub error: Option<VoteErrorKind>,
}

impl VoteAttemptResult {
    pub fn voted(account_index: usize, match_id: impl Into<String>, side_id: impl Into<String>, fuel_spent: u32) -> Self {
        Self {
            account_index,
            match_id: match_id.into(),
            side_id: Some(side_id.into()),
            success: true,
            fuel_spent,
            error: None,
        }
    }

    pub fn failed(account_index: usize, match_id: impl Into<String>, error: VoteErrorKind) -> Self {
        Self {
            account_index,
            match_id: match_id.into(),
            side_id: None,
            success: false,
            fuel_spent: 0,
            error: Some(error),
        }
    }

    /// Insufficient fuel is an expected skip, not an error.
    pub fn is_skip(&self) -> bool {
        matches!(self.error, Some(VoteErrorKind::InsufficientFuel))
    }
}

/// Aggregated outcomes for one pass over all accounts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    pub cycle: u64,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub fuel_spent: u64,
    /// Total fuel left across accounts still active, as last observed
    pub fuel_remaining: u64,
    pub active_accounts: usize,
}

impl CycleSummary {
    pub fn new(cycle: u64, active_accounts: usize) -> Self {
        Self {
            cycle,
            active_accounts,
            ..Default::default()
        }
    }

    pub fn record(&mut self, result: &VoteAttemptResult) {
        if result.success {
            self.succeeded += 1;
            self.fuel_spent += u64::from(result.fuel_spent);
        } else if result.is_skip() {
            self.skipped += 1;
        } else {
            self.failed += 1;
        }
    }

    /// Render a compact colored summary line for the console.
    pub fn render(&self) -> String {
        let ok = format!("{} ok", self.succeeded);
        let failed = format!("{} failed", self.failed);
        let skipped = format!("{} skipped", self.skipped);

        format!(
            "cycle #{}: {} {} {} | {} fuel spent, {} remaining | {} accounts active",
            self.cycle,
            ok.as_str().green(),
            failed.as_str().red(),
            skipped.as_str().yellow(),
            self.fuel_spent,
            self.fuel_remaining,
            self.active_accounts,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let mut summary = CycleSummary::new(1, 3);

        summary.record(&VoteAttemptResult::voted(1, "m-1", "s-1", 3));
        summary.record(&VoteAttemptResult::failed(2, "m-1", VoteErrorKind::InsufficientFuel));
        summary.record(&VoteAttemptResult::failed(
            3,
            "m-1",
            VoteErrorKind::Remote("cannot powerup at this time".to_string()),
        ));

        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.fuel_spent, 3);
    }

    #[test]
    fn test_insufficient_fuel_is_a_skip() {
        let result = VoteAttemptResult::failed(1, "m-1", VoteErrorKind::InsufficientFuel);
        assert!(result.is_skip());
        assert!(!result.success);

        let result = VoteAttemptResult::failed(1, "m-1", VoteErrorKind::WindowClosed);
        assert!(!result.is_skip());
    }
}
