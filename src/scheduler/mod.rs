//! Per-account vote scheduling

mod config;
mod engine;

pub use config::SchedulerConfig;
pub use engine::{SchedulerOutcome, VoteScheduler};
