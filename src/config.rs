//! Versusbot configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backoff::BackoffPolicy;
use crate::domain::SidePreference;
use crate::strategy::FuelStrategy;

/// Main versusbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API endpoints and timeouts
    pub api: ApiConfig,

    /// Account credential source
    pub accounts: AccountsConfig,

    /// Voting behavior
    pub voting: VotingConfig,

    /// Retry and polling cadence
    pub retry: RetryConfig,
}

impl Config {
    /// Validate configuration before use.
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        self.voting.side_preference()?;
        self.voting.fuel_strategy()?;

        if self.voting.delay_min_secs > self.voting.delay_max_secs {
            return Err(eyre::eyre!(
                "delay-min-secs ({}) must not exceed delay-max-secs ({})",
                self.voting.delay_min_secs,
                self.voting.delay_max_secs
            ));
        }

        if self.voting.min_fuel_threshold < 1 {
            return Err(eyre::eyre!("min-fuel-threshold must be at least 1"));
        }

        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .versusbot.yml
        let local_config = PathBuf::from(".versusbot.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/versusbot/versusbot.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("versusbot").join("versusbot.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Remote API endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Versus API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Identity (social client) API base URL
    #[serde(rename = "identity-url")]
    pub identity_url: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://versus-prod-api.wreckleague.xyz".to_string(),
            identity_url: "https://client.farcaster.xyz".to_string(),
            timeout_ms: 10_000,
        }
    }
}

/// Account credential source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// File with one bearer token per line
    #[serde(rename = "tokens-file")]
    pub tokens_file: PathBuf,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            tokens_file: PathBuf::from("accounts.txt"),
        }
    }
}

/// Voting behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingConfig {
    /// Team preference: auto, first (red/left), or second (blue/right)
    #[serde(rename = "team-preference")]
    pub team_preference: String,

    /// Fuel strategy: conservative, max, or custom
    #[serde(rename = "fuel-strategy")]
    pub fuel_strategy: String,

    /// Fuel per vote for the custom strategy
    #[serde(rename = "fuel-amount")]
    pub fuel_amount: u32,

    /// Minimum balance required before any vote is attempted
    #[serde(rename = "min-fuel-threshold")]
    pub min_fuel_threshold: u32,

    /// Lower bound of the pre-vote jitter delay, in seconds
    #[serde(rename = "delay-min-secs")]
    pub delay_min_secs: u64,

    /// Upper bound of the pre-vote jitter delay, in seconds
    #[serde(rename = "delay-max-secs")]
    pub delay_max_secs: u64,

    /// Run accounts sequentially or concurrently
    #[serde(rename = "execution-mode")]
    pub execution_mode: ExecutionMode,

    /// How long to keep polling for a new match before backing off
    #[serde(rename = "max-next-match-wait-secs")]
    pub max_next_match_wait_secs: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            team_preference: "auto".to_string(),
            fuel_strategy: "conservative".to_string(),
            fuel_amount: 1,
            min_fuel_threshold: 1,
            delay_min_secs: 5,
            delay_max_secs: 45,
            execution_mode: ExecutionMode::Concurrent,
            max_next_match_wait_secs: 1800,
        }
    }
}

impl VotingConfig {
    /// Parse the configured team preference.
    pub fn side_preference(&self) -> Result<SidePreference> {
        self.team_preference
            .parse()
            .map_err(|e: String| eyre::eyre!("Invalid team-preference: {}", e))
    }

    /// Build the fuel strategy from the configured name and amounts.
    pub fn fuel_strategy(&self) -> Result<FuelStrategy> {
        match self.fuel_strategy.to_lowercase().as_str() {
            "conservative" => Ok(FuelStrategy::Conservative {
                min: self.min_fuel_threshold,
            }),
            "max" => Ok(FuelStrategy::Max {
                floor: self.min_fuel_threshold,
            }),
            "custom" => Ok(FuelStrategy::Custom {
                amount: self.fuel_amount,
                floor: self.min_fuel_threshold,
            }),
            other => Err(eyre::eyre!(
                "Unknown fuel-strategy: '{}'. Supported: conservative, max, custom",
                other
            )),
        }
    }
}

/// Retry and polling cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Backoff applied to transient remote failures
    #[serde(rename = "error-backoff")]
    pub error_backoff: BackoffPolicy,

    /// Poll interval while waiting for a new match, in seconds
    #[serde(rename = "poll-interval-secs")]
    pub poll_interval_secs: u64,

    /// Sleep before re-checking a match with an unknown window, in seconds
    #[serde(rename = "unknown-retry-secs")]
    pub unknown_retry_secs: u64,

    /// Consecutive zero-fuel cycles before an account is retired
    #[serde(rename = "exhausted-cycles")]
    pub exhausted_cycles: u32,

    /// How long to wait for schedulers to stop before aborting, in seconds
    #[serde(rename = "shutdown-grace-secs")]
    pub shutdown_grace_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            error_backoff: BackoffPolicy::default(),
            poll_interval_secs: 60,
            unknown_retry_secs: 60,
            exhausted_cycles: 2,
            shutdown_grace_secs: 10,
        }
    }
}

/// How accounts are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One shared cycle iterating accounts in order
    Sequential,
    /// One independent scheduler task per account
    #[default]
    Concurrent,
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            _ => Err(format!("Unknown execution mode: {}. Use: sequential or concurrent", s)),
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Concurrent => write!(f, "concurrent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "https://versus-prod-api.wreckleague.xyz");
        assert_eq!(config.voting.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(config.voting.min_fuel_threshold, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
api:
  base-url: https://api.example.test
  timeout-ms: 5000

voting:
  team-preference: blue
  fuel-strategy: custom
  fuel-amount: 3
  delay-min-secs: 10
  delay-max-secs: 20
  execution-mode: sequential

retry:
  poll-interval-secs: 30
  error-backoff:
    initial-secs: 15
    max-secs: 120
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.api.base_url, "https://api.example.test");
        assert_eq!(config.api.timeout_ms, 5000);
        assert_eq!(config.voting.execution_mode, ExecutionMode::Sequential);
        assert_eq!(config.retry.poll_interval_secs, 30);
        assert_eq!(config.retry.error_backoff.initial_secs, 15);
        assert_eq!(
            config.voting.fuel_strategy().unwrap(),
            FuelStrategy::Custom { amount: 3, floor: 1 }
        );
        assert_eq!(config.voting.side_preference().unwrap(), SidePreference::Second);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
voting:
  fuel-strategy: max
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.voting.fuel_strategy.as_str(), "max");
        assert_eq!(config.voting.team_preference, "auto");
        assert_eq!(config.retry.poll_interval_secs, 60);
        assert_eq!(config.api.identity_url, "https://client.farcaster.xyz");
    }

    #[test]
    fn test_validate_rejects_inverted_delay_range() {
        let mut config = Config::default();
        config.voting.delay_min_secs = 60;
        config.voting.delay_max_secs = 5;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_strategy() {
        let mut config = Config::default();
        config.voting.fuel_strategy = "yolo".to_string();

        assert!(config.validate().is_err());
    }
}
