//! Match and side domain types
//!
//! A match is fetched fresh on every poll and never cached across a
//! scheduling decision: the remote service can swap the active match at any
//! time, so every read re-validates identity via `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::SidePreference;

/// Position of a side within a match.
///
/// The remote service does not label sides with a team in all observed
/// payloads; the first/second ordering is the only stable handle available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SidePosition {
    First,
    Second,
}

/// One votable side of a match (a "mech").
///
/// Read-only projection of remote state, used only for ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Side {
    /// Remote side identifier
    pub id: String,

    /// Position in the match's ordered side list (first two sides only)
    pub position: Option<SidePosition>,

    /// Winning probability in percent (0-100)
    pub win_probability: u32,

    /// Votes committed to this side so far
    pub vote_count: u64,

    /// Fuel points committed to this side so far
    pub fuel_points: u64,

    /// Display name of the owning player, when the remote includes it
    pub owner: Option<String>,
}

/// A voting round as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
    /// Opaque identifier, stable for the lifetime of one voting round
    pub id: String,

    /// Remote status string, informational only
    pub status: Option<String>,

    /// Total votes across all sides
    pub total_votes: u64,

    /// When voting opens
    pub voting_start: Option<DateTime<Utc>>,

    /// When voting closes; populated from the generic match end when the
    /// remote omits a dedicated voting-end timestamp
    pub voting_end: Option<DateTime<Utc>>,

    /// Ordered sides, normally exactly two
    pub sides: Vec<Side>,
}

impl Match {
    /// Side at the given position, if present.
    pub fn side_at(&self, position: SidePosition) -> Option<&Side> {
        self.sides.iter().find(|s| s.position == Some(position))
    }

    /// Highest-ranked side by `(win_probability, vote_count, fuel_points)`.
    pub fn best_side(&self) -> Option<&Side> {
        self.sides
            .iter()
            .max_by_key(|s| (s.win_probability, s.vote_count, s.fuel_points))
    }
}

/// Pick the side to vote for.
///
/// A positional preference wins when the matching side exists; otherwise the
/// ranking fallback applies. Returns `None` only when the match has no sides.
pub fn select_side(m: &Match, preference: SidePreference) -> Option<&Side> {
    if let Some(position) = preference.position()
        && let Some(side) = m.side_at(position)
    {
        return Some(side);
    }
    m.best_side()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(id: &str, position: Option<SidePosition>, prob: u32, votes: u64, fuel: u64) -> Side {
        Side {
            id: id.to_string(),
            position,
            win_probability: prob,
            vote_count: votes,
            fuel_points: fuel,
            owner: None,
        }
    }

    fn two_sided(first: Side, second: Side) -> Match {
        Match {
            id: "m-1".to_string(),
            status: None,
            total_votes: 0,
            voting_start: None,
            voting_end: None,
            sides: vec![first, second],
        }
    }

    #[test]
    fn test_preference_overrides_ranking() {
        let m = two_sided(
            side("weak", Some(SidePosition::First), 40, 10, 5),
            side("strong", Some(SidePosition::Second), 65, 100, 50),
        );

        // First side is strictly worse on every metric but the preference
        // still wins.
        let chosen = select_side(&m, SidePreference::First).unwrap();
        assert_eq!(chosen.id, "weak");
    }

    #[test]
    fn test_auto_picks_highest_probability() {
        let m = two_sided(
            side("a", Some(SidePosition::First), 40, 999, 999),
            side("b", Some(SidePosition::Second), 65, 1, 1),
        );

        let chosen = select_side(&m, SidePreference::Auto).unwrap();
        assert_eq!(chosen.id, "b");
    }

    #[test]
    fn test_ranking_tiebreak_by_votes_then_fuel() {
        let m = two_sided(
            side("a", Some(SidePosition::First), 50, 10, 3),
            side("b", Some(SidePosition::Second), 50, 10, 7),
        );

        let chosen = select_side(&m, SidePreference::Auto).unwrap();
        assert_eq!(chosen.id, "b");
    }

    #[test]
    fn test_preference_falls_back_when_position_missing() {
        let m = Match {
            id: "m-1".to_string(),
            status: None,
            total_votes: 0,
            voting_start: None,
            voting_end: None,
            sides: vec![side("only", Some(SidePosition::First), 30, 0, 0)],
        };

        let chosen = select_side(&m, SidePreference::Second).unwrap();
        assert_eq!(chosen.id, "only");
    }

    #[test]
    fn test_no_sides_selects_nothing() {
        let m = Match {
            id: "m-1".to_string(),
            status: None,
            total_votes: 0,
            voting_start: None,
            voting_end: None,
            sides: vec![],
        };

        assert!(select_side(&m, SidePreference::Auto).is_none());
    }
}
