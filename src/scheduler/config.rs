//! Scheduler configuration

use std::time::Duration;

use eyre::Result;

use crate::backoff::BackoffPolicy;
use crate::config::Config;
use crate::strategy::FuelStrategy;

/// Runtime configuration for one vote scheduler.
///
/// Built once from the loaded [`Config`] and threaded into every scheduler
/// instance at construction; nothing here is read from shared mutable state.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fuel spend strategy
    pub strategy: FuelStrategy,

    /// Pre-vote jitter delay bounds
    pub delay_min: Duration,
    pub delay_max: Duration,

    /// Poll interval while seeking the next match
    pub poll_interval: Duration,

    /// Sleep before re-checking a match with an unknown window
    pub unknown_retry: Duration,

    /// Give up seeking a new match after this long and back off
    pub max_next_match_wait: Duration,

    /// Backoff for transient remote failures
    pub error_backoff: BackoffPolicy,

    /// Consecutive zero-fuel cycles before the account retires
    pub exhausted_cycles: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            strategy: FuelStrategy::Conservative { min: 1 },
            delay_min: Duration::from_secs(5),
            delay_max: Duration::from_secs(45),
            poll_interval: Duration::from_secs(60),
            unknown_retry: Duration::from_secs(60),
            max_next_match_wait: Duration::from_secs(1800),
            error_backoff: BackoffPolicy::default(),
            exhausted_cycles: 2,
        }
    }
}

impl SchedulerConfig {
    /// Derive scheduler settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            strategy: config.voting.fuel_strategy()?,
            delay_min: Duration::from_secs(config.voting.delay_min_secs),
            delay_max: Duration::from_secs(config.voting.delay_max_secs),
            poll_interval: Duration::from_secs(config.retry.poll_interval_secs.max(1)),
            unknown_retry: Duration::from_secs(config.retry.unknown_retry_secs.max(1)),
            max_next_match_wait: Duration::from_secs(config.voting.max_next_match_wait_secs),
            error_backoff: config.retry.error_backoff,
            exhausted_cycles: config.retry.exhausted_cycles.max(1),
        })
    }
}
