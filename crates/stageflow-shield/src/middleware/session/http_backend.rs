//! Session backend speaking the hosted auth HTTP API.

use super::backend::{SessionBackend, SessionBackendError};
use super::claims;
use super::types::{RefreshOutcome, SessionUser, TokenGrant, TokenValidation, ValidatedToken};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Lifetime assumed for tokens that do not carry an `exp` claim.
const ASSUMED_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

impl From<UserPayload> for SessionUser {
    fn from(payload: UserPayload) -> Self {
        Self {
            id: payload.id,
            email: payload.email,
            role: payload.role,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GrantPayload {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserPayload,
}

/// HTTP client for the hosted auth service.
#[derive(Debug, Clone)]
pub struct HttpSessionBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpSessionBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SessionBackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SessionBackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_settings(settings: &crate::config::BackendSettings) -> Result<Self, SessionBackendError> {
        Self::new(
            settings.url.clone(),
            settings.api_key.clone(),
            Duration::from_millis(settings.timeout_ms),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Classify a rejected token from the response body and the token itself.
    async fn rejection(token: &str, response: Response) -> TokenValidation {
        let past_exp = claims::token_expiry(token).map_or(false, |exp| exp <= Utc::now());
        let body = response.text().await.unwrap_or_default().to_ascii_lowercase();

        if past_exp || body.contains("expired") {
            TokenValidation::Expired
        } else {
            TokenValidation::Invalid
        }
    }
}

fn timestamp(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

fn seconds_from_now(secs: i64) -> Option<DateTime<Utc>> {
    ChronoDuration::try_seconds(secs).and_then(|delta| Utc::now().checked_add_signed(delta))
}

/// Expiry of a refresh grant. Out-of-range values are a malformed payload.
fn grant_expiry(
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    access_token: &str,
) -> Result<DateTime<Utc>, SessionBackendError> {
    let explicit = match (expires_at, expires_in) {
        (Some(at), _) => Some(timestamp(at).ok_or_else(|| {
            SessionBackendError::Decode(format!("expires_at out of range: {}", at))
        })?),
        (None, Some(secs)) => Some(seconds_from_now(secs).ok_or_else(|| {
            SessionBackendError::Decode(format!("expires_in out of range: {}", secs))
        })?),
        (None, None) => None,
    };

    Ok(explicit
        .or_else(|| claims::token_expiry(access_token))
        .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(ASSUMED_TOKEN_LIFETIME_SECS)))
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    async fn validate(&self, access_token: &str) -> Result<TokenValidation, SessionBackendError> {
        let response = self
            .client
            .get(self.endpoint("/auth/v1/user"))
            .bearer_auth(access_token)
            .header("apikey", &self.api_key)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let user: UserPayload = response.json().await?;
            let expires_at = claims::token_expiry(access_token)
                .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(ASSUMED_TOKEN_LIFETIME_SECS));
            debug!(user_id = %user.id, %expires_at, "Access token accepted");
            return Ok(TokenValidation::Valid(ValidatedToken {
                user: user.into(),
                expires_at,
            }));
        }

        if status.is_client_error() {
            let verdict = if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                Self::rejection(access_token, response).await
            } else {
                TokenValidation::Invalid
            };
            debug!(status = status.as_u16(), ?verdict, "Access token rejected");
            return Ok(verdict);
        }

        warn!(status = status.as_u16(), "Session backend failed to validate token");
        Err(SessionBackendError::Status {
            status: status.as_u16(),
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshOutcome, SessionBackendError> {
        let response = self
            .client
            .post(self.endpoint("/auth/v1/token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let grant: GrantPayload = response.json().await?;
            let expires_at = grant_expiry(grant.expires_at, grant.expires_in, &grant.access_token)?;

            debug!(user_id = %grant.user.id, %expires_at, "Session refreshed");
            return Ok(RefreshOutcome::Refreshed(TokenGrant {
                user: grant.user.into(),
                access_token: grant.access_token,
                refresh_token: grant.refresh_token,
                expires_at,
            }));
        }

        if status.is_client_error() {
            debug!(status = status.as_u16(), "Refresh token rejected");
            return Ok(RefreshOutcome::Invalid);
        }

        warn!(status = status.as_u16(), "Session backend failed to refresh token");
        Err(SessionBackendError::Status {
            status: status.as_u16(),
        })
    }
}
