//! Remote voting service client
//!
//! The scheduler only sees the [`VotingService`] capability trait; the
//! production implementation is [`VersusClient`]. Every operation is
//! fallible and every failure is recoverable from the scheduler's point of
//! view. Policy for degrading (balance errors read as 0, claim errors are
//! ignored, vote rejections become attempt results) lives in the scheduler,
//! not here.

use async_trait::async_trait;

mod error;
mod http;
pub mod mock;
mod types;

pub use error::ServiceError;
pub use http::VersusClient;

use crate::domain::Match;

/// Identity resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub fid: u64,
    pub username: Option<String>,
}

/// A vote to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRequest {
    pub fid: u64,
    pub match_id: String,
    pub side_id: String,
    /// Must be >= 1; the strategy layer guarantees this
    pub fuel_points: u32,
}

/// Acknowledgement of an accepted vote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoteReceipt {
    pub message: Option<String>,
}

/// Capability interface the scheduler requires from the remote service.
#[async_trait]
pub trait VotingService: Send + Sync {
    /// Resolve the remote user id behind a credential.
    async fn resolve_identity(&self, credential: &str) -> Result<Identity, ServiceError>;

    /// The currently advertised match, if any.
    async fn current_match(&self, fid: u64) -> Result<Option<Match>, ServiceError>;

    /// Current fuel balance for the account.
    async fn fuel_balance(&self, credential: &str, fid: u64) -> Result<u32, ServiceError>;

    /// Claim any pending fuel reward; returns the amount granted (may be 0).
    async fn claim_fuel_reward(&self, credential: &str, fid: u64) -> Result<u32, ServiceError>;

    /// Submit a vote. A rejection surfaces as `Err`; the caller records it
    /// in the attempt result rather than propagating.
    async fn submit_vote(&self, credential: &str, vote: &VoteRequest) -> Result<VoteReceipt, ServiceError>;
}
