//! Remote service error types

use thiserror::Error;

/// Errors from the remote voting service.
///
/// The scheduler treats every variant as recoverable; `is_retryable` only
/// controls whether the HTTP layer retries before surfacing the error.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON decode error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    /// Whether the HTTP layer should retry before giving up.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Api { status, .. } => matches!(status, 408 | 429) || *status >= 500,
            ServiceError::Network(_) => true,
            ServiceError::InvalidResponse(_) => false,
            ServiceError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(
            ServiceError::Api {
                status: 503,
                message: "unavailable".to_string()
            }
            .is_retryable()
        );

        assert!(
            ServiceError::Api {
                status: 429,
                message: "slow down".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(
            !ServiceError::Api {
                status: 400,
                message: "bad request".to_string()
            }
            .is_retryable()
        );

        assert!(!ServiceError::InvalidResponse("missing fid".to_string()).is_retryable());
    }
}
