//! Domain types shared across the scheduler and orchestrator

pub mod account;
pub mod vote;

// Note: 'match' is a reserved keyword, so we use r#match
#[path = "match.rs"]
pub mod r#match;

pub use account::{Account, SidePreference, load_accounts};
pub use r#match::{Match, Side, SidePosition, select_side};
pub use vote::{CycleSummary, VoteAttemptResult, VoteErrorKind};
