//! Session types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User resolved from a valid access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Tokens backing an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Seconds until the access token expires; negative once expired.
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

/// Result of a successful access-token check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    pub user: SessionUser,
    pub expires_at: DateTime<Utc>,
}

/// Backend verdict on an access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValidation {
    Valid(ValidatedToken),
    Expired,
    Invalid,
}

/// New token pair issued by a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub user: SessionUser,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Backend verdict on a refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed(TokenGrant),
    Invalid,
}

/// Where a request ended up in session resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    NoSession,
    Valid,
    ValidNeedsRefresh,
    Refreshed,
    Invalid,
}

impl SessionState {
    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Valid | Self::ValidNeedsRefresh | Self::Refreshed)
    }
}

/// Why no session could be established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    Missing,
    Invalid,
    Expired,
}

/// Authenticated caller handed to handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: SessionUser,
    pub session: Session,
    pub needs_refresh: bool,
}

/// Full outcome of resolving a request's session cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResolution {
    pub state: SessionState,
    pub session: Option<AuthSession>,
    /// Whole `Set-Cookie` values to attach to the response.
    pub set_cookies: Vec<String>,
    pub failure: Option<FailureReason>,
    /// The backend could not be reached or answered unexpectedly.
    pub backend_failed: bool,
}

impl SessionResolution {
    pub(crate) fn unauthenticated(state: SessionState, failure: FailureReason) -> Self {
        Self {
            state,
            session: None,
            set_cookies: Vec::new(),
            failure: Some(failure),
            backend_failed: false,
        }
    }

    pub(crate) fn authenticated(state: SessionState, session: AuthSession) -> Self {
        Self {
            state,
            session: Some(session),
            set_cookies: Vec::new(),
            failure: None,
            backend_failed: false,
        }
    }

    /// The caller, if any.
    pub fn auth(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn into_auth(self) -> Option<AuthSession> {
        self.session
    }
}
