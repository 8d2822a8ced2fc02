//! HTTP implementation of the voting service client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ApiConfig;

use super::types::{
    FuelRewardResponse, MatchDetailsResponse, MeResponse, PredictRequest, PredictResponse, UserDataResponse,
};
use super::{Identity, ServiceError, VoteReceipt, VoteRequest, VotingService};
use crate::domain::Match;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Production client for the Wreck League Versus API.
pub struct VersusClient {
    http: Client,
    base_url: String,
    identity_url: String,
}

impl VersusClient {
    /// Create a client from configuration. Every request is bounded by the
    /// configured timeout.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(ServiceError::Network)?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            identity_url: config.identity_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, url: &str, credential: Option<&str>) -> RequestBuilder {
        let mut builder = self.http.request(method, url);
        if let Some(token) = credential {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Send a request, retrying transient failures with exponential backoff,
    /// and decode the JSON body.
    async fn send_json<T: DeserializeOwned>(
        &self,
        build: impl Fn() -> RequestBuilder,
    ) -> Result<T, ServiceError> {
        let mut last_error = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match build().send().await {
                Ok(r) => r,
                Err(e) => {
                    debug!(attempt, error = %e, "network error");
                    last_error = Some(ServiceError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let message = response.text().await.unwrap_or_default();
                debug!(attempt, status, "retryable status");
                last_error = Some(ServiceError::Api { status, message });
                continue;
            }

            if !response.status().is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(ServiceError::Api { status, message });
            }

            return response.json::<T>().await.map_err(ServiceError::Network);
        }

        Err(last_error.unwrap_or_else(|| ServiceError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

#[async_trait]
impl VotingService for VersusClient {
    async fn resolve_identity(&self, credential: &str) -> Result<Identity, ServiceError> {
        let url = format!("{}/v2/me", self.identity_url);
        let me: MeResponse = self
            .send_json(|| self.request(Method::GET, &url, Some(credential)))
            .await?;

        let user = me
            .result
            .and_then(|r| r.user)
            .ok_or_else(|| ServiceError::InvalidResponse("identity response carried no user".to_string()))?;

        let fid = user
            .fid
            .ok_or_else(|| ServiceError::InvalidResponse("identity response carried no fid".to_string()))?;

        debug!(fid, username = ?user.username, "resolved identity");

        Ok(Identity {
            fid,
            username: user.username,
        })
    }

    async fn current_match(&self, fid: u64) -> Result<Option<Match>, ServiceError> {
        let url = format!("{}/v1/match/details?fId={}", self.base_url, fid);
        let details: MatchDetailsResponse = self.send_json(|| self.request(Method::GET, &url, None)).await?;

        // The first entry is the active round; an empty list means no match
        // is currently advertised.
        Ok(details
            .data
            .map(|d| d.match_data)
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|wire| wire.into_match()))
    }

    async fn fuel_balance(&self, credential: &str, fid: u64) -> Result<u32, ServiceError> {
        let url = format!("{}/v1/user/data?fId={}", self.base_url, fid);
        let data: UserDataResponse = self
            .send_json(|| self.request(Method::GET, &url, Some(credential)))
            .await?;

        Ok(data.fuel_balance())
    }

    async fn claim_fuel_reward(&self, credential: &str, fid: u64) -> Result<u32, ServiceError> {
        let url = format!("{}/v1/user/fuelReward?fId={}", self.base_url, fid);
        let reward: FuelRewardResponse = self
            .send_json(|| self.request(Method::POST, &url, Some(credential)))
            .await?;

        Ok(reward.fuel.max(0) as u32)
    }

    async fn submit_vote(&self, credential: &str, vote: &VoteRequest) -> Result<VoteReceipt, ServiceError> {
        let url = format!("{}/v2/matches/predict", self.base_url);
        let payload = PredictRequest {
            f_id: vote.fid,
            mech_id: &vote.side_id,
            match_id: &vote.match_id,
            fuel_points: vote.fuel_points,
        };

        debug!(
            fid = vote.fid,
            match_id = %vote.match_id,
            side_id = %vote.side_id,
            fuel = vote.fuel_points,
            "submitting vote"
        );

        let idempotency_key = Uuid::new_v4().to_string();
        let response: PredictResponse = self
            .send_json(|| {
                self.request(Method::PUT, &url, Some(credential))
                    .header("idempotency-key", idempotency_key.as_str())
                    .json(&payload)
            })
            .await?;

        Ok(VoteReceipt {
            message: response.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;

    #[test]
    fn test_from_config_trims_trailing_slashes() {
        let client = VersusClient::from_config(&ApiConfig {
            base_url: "https://api.example.test/".to_string(),
            identity_url: "https://id.example.test/".to_string(),
            timeout_ms: 10_000,
        })
        .unwrap();

        assert_eq!(client.base_url, "https://api.example.test");
        assert_eq!(client.identity_url, "https://id.example.test");
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(200));
        assert!(!is_retryable_status(400));
        assert!(!is_retryable_status(401));
    }
}
