//! Session backend contract.

use super::types::{RefreshOutcome, TokenValidation};
use async_trait::async_trait;

/// Failures talking to the session backend.
///
/// A rejected token is not an error; it is reported through
/// [`TokenValidation`] / [`RefreshOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum SessionBackendError {
    #[error("Session backend timed out")]
    Timeout,
    #[error("Session backend unreachable: {0}")]
    Transport(String),
    #[error("Session backend returned status {status}")]
    Status { status: u16 },
    #[error("Session backend response malformed: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SessionBackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// External service that validates and refreshes tokens.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Check an access token.
    async fn validate(&self, access_token: &str) -> Result<TokenValidation, SessionBackendError>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, SessionBackendError>;
}
