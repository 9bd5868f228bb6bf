//! Process-wide and per-request context.

use crate::config::ShieldConfig;
use crate::cookie;
use crate::error::{ApiError, ApiResult, ErrorHook};
use crate::flags::{FeatureFlagDecision, FeatureFlags};
use crate::middleware::cors::{CorsBuilder, OriginGuard};
use crate::middleware::csrf::CsrfValidator;
use crate::middleware::session::{
    AuthSession, HttpSessionBackend, SessionBackend, SessionBackendError, SessionManager,
    SessionState, SessionUser,
};
use crate::monitoring::ShieldMetrics;
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a boundary needs, built once at startup.
pub struct ShieldContext {
    pub config: Arc<ShieldConfig>,
    pub origins: OriginGuard,
    pub csrf: CsrfValidator,
    pub sessions: SessionManager,
    pub flags: FeatureFlags,
    pub metrics: Arc<ShieldMetrics>,
    pub error_hook: Option<ErrorHook>,
}

impl ShieldContext {
    pub fn new(config: ShieldConfig, backend: Arc<dyn SessionBackend>) -> Self {
        let origins = OriginGuard::new(CorsBuilder::from_settings(&config.cors).build());
        let csrf = CsrfValidator::new(
            config.csrf.header_name.clone(),
            config.csrf.cookie_name.clone(),
            config.session.access_max_age_secs,
        );
        let sessions = SessionManager::new(backend, config.session.clone());
        let flags = FeatureFlags::new(&config.flags);

        Self {
            config: Arc::new(config),
            origins,
            csrf,
            sessions,
            flags,
            metrics: Arc::new(ShieldMetrics::new()),
            error_hook: None,
        }
    }

    /// Context talking to the configured hosted auth service.
    pub fn from_config(config: ShieldConfig) -> Result<Self, SessionBackendError> {
        let backend = HttpSessionBackend::from_settings(&config.backend)?;
        Ok(Self::new(config, Arc::new(backend)))
    }

    pub fn with_error_hook(mut self, hook: ErrorHook) -> Self {
        self.error_hook = Some(hook);
        self
    }

    pub fn with_flags(mut self, flags: FeatureFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// What a handler sees of the request.
pub struct RequestContext {
    pub request_id: String,
    pub endpoint: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub session: Option<AuthSession>,
    pub session_state: Option<SessionState>,
    pub flags: FeatureFlagDecision,
    pub shield: Arc<ShieldContext>,
}

impl RequestContext {
    pub fn user(&self) -> Option<&SessionUser> {
        self.session.as_ref().map(|s| &s.user)
    }

    /// The caller, or an authentication error for optional-session endpoints.
    pub fn require_user(&self) -> Result<&SessionUser, ApiError> {
        self.user().ok_or(ApiError::Unauthorized)
    }

    pub fn cookies(&self) -> HashMap<String, String> {
        cookie::parse_headers(&self.headers)
    }

    /// Deserialize the JSON body.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        if self.body.is_empty() {
            return Err(ApiError::Validation("Request body is required".into()).into());
        }
        Ok(serde_json::from_slice(&self.body)?)
    }
}
