//! Retry backoff policy
//!
//! Shared by the scheduler and orchestrator for transient remote failures:
//! missing match data, network errors, malformed responses. Every retry path
//! sleeps at least the initial delay; nothing retries in a tight loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exponential backoff with a cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Delay for the first retry, in seconds
    #[serde(rename = "initial-secs")]
    pub initial_secs: u64,

    /// Upper bound for any single delay, in seconds
    #[serde(rename = "max-secs")]
    pub max_secs: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_secs: 30,
            max_secs: 300,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (0-based), doubling each time up
    /// to the cap.
    pub fn delay(&self, attempt: u32) -> Duration {
        let initial = self.initial_secs.max(1);
        let secs = initial.saturating_mul(2u64.saturating_pow(attempt.min(16)));
        Duration::from_secs(secs.min(self.max_secs.max(initial)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_until_capped() {
        let policy = BackoffPolicy {
            initial_secs: 30,
            max_secs: 300,
        };

        assert_eq!(policy.delay(0), Duration::from_secs(30));
        assert_eq!(policy.delay(1), Duration::from_secs(60));
        assert_eq!(policy.delay(2), Duration::from_secs(120));
        assert_eq!(policy.delay(3), Duration::from_secs(240));
        assert_eq!(policy.delay(4), Duration::from_secs(300));
        assert_eq!(policy.delay(20), Duration::from_secs(300));
    }

    #[test]
    fn test_minimum_delay_is_one_second() {
        let policy = BackoffPolicy {
            initial_secs: 0,
            max_secs: 0,
        };

        assert!(policy.delay(0) >= Duration::from_secs(1));
    }
}
