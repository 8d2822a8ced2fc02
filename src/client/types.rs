//! Wire types for the remote voting service
//!
//! One explicit schema per endpoint. Fields the scheduler does not consume
//! are omitted; anything missing or malformed fails closed (absent option,
//! zero balance) instead of being probed for under alternate key paths.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Match, Side, SidePosition};

/// `GET /v1/match/details?fId={fid}`
#[derive(Debug, Deserialize)]
pub(crate) struct MatchDetailsResponse {
    pub data: Option<MatchDetailsData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MatchDetailsData {
    #[serde(rename = "matchData", default)]
    pub match_data: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMatch {
    #[serde(rename = "_id")]
    pub id: String,

    pub status: Option<String>,

    #[serde(rename = "totalVotes", default)]
    pub total_votes: u64,

    #[serde(rename = "votingStartTime")]
    pub voting_start_time: Option<String>,

    #[serde(rename = "votingEndTime")]
    pub voting_end_time: Option<String>,

    #[serde(rename = "endTime")]
    pub end_time: Option<String>,

    #[serde(rename = "mechDetails", default)]
    pub mech_details: Vec<WireMech>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMech {
    #[serde(rename = "mechId")]
    pub mech_id: String,

    #[serde(rename = "winningProbability", default)]
    pub winning_probability: u32,

    #[serde(rename = "mechVotes", default)]
    pub mech_votes: WireMechVotes,

    #[serde(rename = "userData")]
    pub user_data: Option<WireMechOwner>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireMechVotes {
    #[serde(rename = "voteCount", default)]
    pub vote_count: u64,

    #[serde(rename = "fuelPoints", default)]
    pub fuel_points: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireMechOwner {
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

impl WireMatch {
    /// Convert into the domain type.
    ///
    /// The voting end falls back to the generic match end when the dedicated
    /// voting-end timestamp is absent. Sides carry their wire order as an
    /// explicit position (first two only).
    pub fn into_match(self) -> Match {
        let voting_end = self.voting_end_time.or(self.end_time);

        let sides = self
            .mech_details
            .into_iter()
            .enumerate()
            .map(|(i, mech)| Side {
                id: mech.mech_id,
                position: match i {
                    0 => Some(SidePosition::First),
                    1 => Some(SidePosition::Second),
                    _ => None,
                },
                win_probability: mech.winning_probability,
                vote_count: mech.mech_votes.vote_count,
                fuel_points: mech.mech_votes.fuel_points,
                owner: mech.user_data.and_then(|u| u.display_name),
            })
            .collect();

        Match {
            id: self.id,
            status: self.status,
            total_votes: self.total_votes,
            voting_start: self.voting_start_time.as_deref().and_then(parse_remote_time),
            voting_end: voting_end.as_deref().and_then(parse_remote_time),
            sides,
        }
    }
}

/// `GET /v1/user/data?fId={fid}`
///
/// The balance sits two levels deep (`data.data.fuelBalance`); any mismatch
/// reads as no balance.
#[derive(Debug, Deserialize)]
pub(crate) struct UserDataResponse {
    pub data: Option<UserDataOuter>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDataOuter {
    pub data: Option<UserDataInner>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserDataInner {
    #[serde(rename = "fuelBalance", default)]
    pub fuel_balance: i64,
}

impl UserDataResponse {
    pub fn fuel_balance(&self) -> u32 {
        self.data
            .as_ref()
            .and_then(|outer| outer.data.as_ref())
            .map(|inner| inner.fuel_balance.max(0) as u32)
            .unwrap_or(0)
    }
}

/// `PUT /v2/matches/predict`
#[derive(Debug, Serialize)]
pub(crate) struct PredictRequest<'a> {
    #[serde(rename = "fId")]
    pub f_id: u64,

    #[serde(rename = "mechId")]
    pub mech_id: &'a str,

    #[serde(rename = "matchId")]
    pub match_id: &'a str,

    #[serde(rename = "fuelPoints")]
    pub fuel_points: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PredictResponse {
    pub message: Option<String>,
}

/// `POST /v1/user/fuelReward?fId={fid}`
#[derive(Debug, Deserialize)]
pub(crate) struct FuelRewardResponse {
    #[serde(default)]
    pub fuel: i64,
}

/// `GET /v2/me` on the identity host
#[derive(Debug, Deserialize)]
pub(crate) struct MeResponse {
    pub result: Option<MeResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeResult {
    pub user: Option<MeUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MeUser {
    pub fid: Option<u64>,
    pub username: Option<String>,
}

/// Parse a remote timestamp, assuming UTC when no offset is present.
pub(crate) fn parse_remote_time(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    // Timezone-naive fallback, e.g. "2025-06-01T12:00:00"
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
