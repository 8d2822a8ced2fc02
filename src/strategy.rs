//! Fuel spend strategies
//!
//! A strategy is a pure function from the current balance to an amount to
//! spend, or `None` when the balance is below the strategy's requirement.
//! Insufficient balance is an expected condition, not an error.

use serde::{Deserialize, Serialize};

/// How much fuel to commit per vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FuelStrategy {
    /// Spend exactly `min`, only when the balance covers it
    Conservative { min: u32 },
    /// Spend the entire balance, only when it reaches `floor`
    Max { floor: u32 },
    /// Spend `min(amount, balance)`, only when the balance reaches `floor`
    Custom { amount: u32, floor: u32 },
}

impl FuelStrategy {
    /// Amount to spend for the given balance, or `None` when insufficient.
    ///
    /// Never returns more than `balance`.
    pub fn fuel_to_spend(&self, balance: u32) -> Option<u32> {
        match *self {
            Self::Conservative { min } => {
                let min = min.max(1);
                (balance >= min).then_some(min)
            }
            Self::Max { floor } => (balance >= floor.max(1)).then_some(balance),
            Self::Custom { amount, floor } => {
                let amount = amount.max(1);
                (balance >= floor.max(1)).then_some(amount.min(balance))
            }
        }
    }
}

impl std::fmt::Display for FuelStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Conservative { min } => write!(f, "conservative ({} fuel)", min),
            Self::Max { .. } => write!(f, "max available"),
            Self::Custom { amount, .. } => write!(f, "custom ({} fuel)", amount),
        }
    }
}
