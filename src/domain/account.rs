//! Account domain type and credential loading

use std::fs;
use std::path::Path;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use super::r#match::SidePosition;

/// Which side of a match an account prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidePreference {
    /// Rank sides by their metrics and pick the best
    #[default]
    Auto,
    First,
    Second,
}

impl SidePreference {
    /// Map the preference to a side position.
    ///
    /// This is the single place where a team preference becomes a positional
    /// choice. The color/direction aliases accepted by `FromStr` reflect
    /// observed frame behavior (first = red/left, second = blue/right), not a
    /// documented remote contract.
    pub fn position(self) -> Option<SidePosition> {
        match self {
            Self::Auto => None,
            Self::First => Some(SidePosition::First),
            Self::Second => Some(SidePosition::Second),
        }
    }
}

impl std::str::FromStr for SidePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "first" | "left" | "red" => Ok(Self::First),
            "second" | "right" | "blue" => Ok(Self::Second),
            _ => Err(format!(
                "Unknown team preference: {}. Use: auto, first (red/left), or second (blue/right)",
                s
            )),
        }
    }
}

impl std::fmt::Display for SidePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::First => write!(f, "first"),
            Self::Second => write!(f, "second"),
        }
    }
}

/// One voting account.
///
/// Constructed once from the credential list at startup. Identity resolution
/// is lazy; the fuel balance is a last-observed value and is refreshed
/// immediately before each vote attempt, never trusted across a sleep.
#[derive(Debug, Clone)]
pub struct Account {
    /// Local ordinal (1-based) for logging and result attribution
    pub index: usize,

    /// Opaque bearer token
    pub credential: String,

    /// Remote user id, resolved lazily on first use
    pub fid: Option<u64>,

    /// Remote username, populated alongside `fid` when available
    pub username: Option<String>,

    /// Last observed fuel balance (may be stale)
    pub fuel_balance: u32,

    /// Side preference applied when voting
    pub side_preference: SidePreference,
}

impl Account {
    pub fn new(index: usize, credential: impl Into<String>, side_preference: SidePreference) -> Self {
        Self {
            index,
            credential: credential.into(),
            fid: None,
            username: None,
            fuel_balance: 0,
            side_preference,
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        match self.fid {
            Some(fid) => format!("account {} (fid {})", self.index, fid),
            None => format!("account {}", self.index),
        }
    }
}

/// Load accounts from a credentials file: one bearer token per line, blank
/// lines and `#` comments ignored.
pub fn load_accounts<P: AsRef<Path>>(path: P, side_preference: SidePreference) -> Result<Vec<Account>> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read accounts file {}", path.as_ref().display()))?;

    let accounts: Vec<Account> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(i, token)| Account::new(i + 1, token, side_preference))
        .collect();

    if accounts.is_empty() {
        return Err(eyre::eyre!(
            "No credentials found in {}",
            path.as_ref().display()
        ));
    }

    Ok(accounts)
}
