//! Versusbot - match-timing-driven vote scheduler
//!
//! Automates voting in the Wreck League Versus frame across one or many
//! accounts. Each account runs a small state machine that waits for a match's
//! voting window, spends fuel on the selected side, cools down until the
//! window closes, and seeks the next match; an orchestrator runs those
//! machines sequentially or concurrently and aggregates the outcomes.
//!
//! # Design notes
//!
//! - **Window classification is pure**: [`window::classify`] is a function of
//!   `(match, now)` with no I/O, so timing decisions are testable with frozen
//!   clocks.
//! - **Every remote failure is recoverable**: network errors, missing match
//!   data and malformed responses degrade to a bounded backoff and a retry;
//!   only cancellation (and per-account fuel exhaustion) is terminal.
//! - **Cooperative cancellation**: every sleep is sliced and raced against a
//!   shared cancellation token, so shutdown reaches all accounts promptly.
//!
//! # Modules
//!
//! - [`client`] - capability interface to the remote voting service
//! - [`window`] - voting window classification
//! - [`strategy`] - fuel spend strategies
//! - [`scheduler`] - per-account vote scheduler state machine
//! - [`orchestrator`] - multi-account orchestration
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod backoff;
pub mod cli;
pub mod client;
pub mod config;
pub mod domain;
pub mod orchestrator;
pub mod scheduler;
pub mod strategy;
pub mod window;

// Re-export commonly used types
pub use backoff::BackoffPolicy;
pub use client::{Identity, ServiceError, VersusClient, VoteReceipt, VoteRequest, VotingService};
pub use config::{Config, ExecutionMode};
pub use domain::{
    Account, CycleSummary, Match, Side, SidePosition, SidePreference, VoteAttemptResult, VoteErrorKind, load_accounts,
    select_side,
};
pub use orchestrator::Orchestrator;
pub use scheduler::{SchedulerConfig, SchedulerOutcome, VoteScheduler};
pub use strategy::FuelStrategy;
pub use window::{WindowState, classify};
