//! Scriptable in-memory voting service for tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Identity, ServiceError, VoteReceipt, VoteRequest, VotingService};
use crate::domain::Match;

#[derive(Default)]
struct MockState {
    current_match: Option<Match>,
    balances: HashMap<u64, u32>,
    claim_grants: HashMap<u64, u32>,
    fids: HashMap<String, u64>,
    next_fid: u64,
    votes: Vec<VoteRequest>,
    reject_votes: Option<String>,
    fail_match_fetch: bool,
}

/// In-memory [`VotingService`] with scriptable state.
///
/// Identities are assigned sequentially per credential. Submitted votes are
/// recorded and deduct from the account balance; claims are one-shot grants.
pub struct MockVotingService {
    state: Mutex<MockState>,
}

impl Default for MockVotingService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVotingService {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                next_fid: 1000,
                ..Default::default()
            }),
        }
    }

    pub fn set_match(&self, m: Option<Match>) {
        self.state.lock().unwrap().current_match = m;
    }

    pub fn set_balance(&self, fid: u64, balance: u32) {
        self.state.lock().unwrap().balances.insert(fid, balance);
    }

    pub fn set_claim_grant(&self, fid: u64, grant: u32) {
        self.state.lock().unwrap().claim_grants.insert(fid, grant);
    }

    /// Make every subsequent vote submission fail with this message.
    pub fn reject_votes(&self, message: impl Into<String>) {
        self.state.lock().unwrap().reject_votes = Some(message.into());
    }

    /// Make match fetches fail until cleared.
    pub fn fail_match_fetch(&self, fail: bool) {
        self.state.lock().unwrap().fail_match_fetch = fail;
    }

    pub fn submitted_votes(&self) -> Vec<VoteRequest> {
        self.state.lock().unwrap().votes.clone()
    }
}

#[async_trait]
impl VotingService for MockVotingService {
    async fn resolve_identity(&self, credential: &str) -> Result<Identity, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let fid = match state.fids.get(credential).copied() {
            Some(fid) => fid,
            None => {
                let fid = state.next_fid;
                state.next_fid += 1;
                state.fids.insert(credential.to_string(), fid);
                fid
            }
        };

        Ok(Identity {
            fid,
            username: Some(format!("user-{}", fid)),
        })
    }

    async fn current_match(&self, _fid: u64) -> Result<Option<Match>, ServiceError> {
        let state = self.state.lock().unwrap();
        if state.fail_match_fetch {
            return Err(ServiceError::Api {
                status: 500,
                message: "match service unavailable".to_string(),
            });
        }
        Ok(state.current_match.clone())
    }

    async fn fuel_balance(&self, _credential: &str, fid: u64) -> Result<u32, ServiceError> {
        Ok(*self.state.lock().unwrap().balances.get(&fid).unwrap_or(&0))
    }

    async fn claim_fuel_reward(&self, _credential: &str, fid: u64) -> Result<u32, ServiceError> {
        let mut state = self.state.lock().unwrap();
        let grant = state.claim_grants.remove(&fid).unwrap_or(0);
        if grant > 0 {
            *state.balances.entry(fid).or_insert(0) += grant;
        }
        Ok(grant)
    }

    async fn submit_vote(&self, _credential: &str, vote: &VoteRequest) -> Result<VoteReceipt, ServiceError> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = &state.reject_votes {
            return Err(ServiceError::Api {
                status: 400,
                message: message.clone(),
            });
        }

        let balance = state.balances.entry(vote.fid).or_insert(0);
        *balance = balance.saturating_sub(vote.fuel_points);
        state.votes.push(vote.clone());

        Ok(VoteReceipt {
            message: Some("prediction accepted".to_string()),
        })
    }
}
