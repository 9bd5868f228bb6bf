//! Session resolution with transparent refresh.

use super::backend::SessionBackend;
use super::types::{
    AuthSession, FailureReason, RefreshOutcome, Session, SessionResolution, SessionState,
    TokenGrant, TokenValidation,
};
use crate::config::SessionSettings;
use crate::cookie::{self, CookieOptions};
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves the caller's session from request cookies.
///
/// Every backend failure resolves to an unauthenticated result.
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn SessionBackend>,
    settings: SessionSettings,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn SessionBackend>, settings: SessionSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn resolve_headers(&self, headers: &HeaderMap) -> SessionResolution {
        self.resolve(&cookie::parse_headers(headers)).await
    }

    pub async fn resolve(&self, cookies: &HashMap<String, String>) -> SessionResolution {
        self.resolve_at(cookies, Utc::now()).await
    }

    /// Resolve against an explicit clock.
    pub async fn resolve_at(
        &self,
        cookies: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> SessionResolution {
        let lookup = |name: &str| cookies.get(name).filter(|v| !v.is_empty()).cloned();

        let Some(access_token) = lookup(&self.settings.access_cookie) else {
            return SessionResolution::unauthenticated(SessionState::NoSession, FailureReason::Missing);
        };
        let refresh_token = lookup(&self.settings.refresh_cookie);

        let reason = match self.backend.validate(&access_token).await {
            Ok(TokenValidation::Valid(validated)) => {
                let session = Session {
                    user_id: validated.user.id.clone(),
                    access_token,
                    refresh_token,
                    expires_at: validated.expires_at,
                };
                let needs_refresh = session.remaining_secs(now) < self.settings.near_expiry_secs;
                let state = if needs_refresh {
                    SessionState::ValidNeedsRefresh
                } else {
                    SessionState::Valid
                };
                debug!(user_id = %session.user_id, ?state, "Session validated");
                return SessionResolution::authenticated(
                    state,
                    AuthSession {
                        user: validated.user,
                        session,
                        needs_refresh,
                    },
                );
            }
            Ok(TokenValidation::Expired) => FailureReason::Expired,
            Ok(TokenValidation::Invalid) => FailureReason::Invalid,
            Err(e) => {
                warn!(error = %e, "Session validation failed; treating session as invalid");
                let mut resolution =
                    SessionResolution::unauthenticated(SessionState::Invalid, FailureReason::Invalid);
                resolution.backend_failed = true;
                return resolution;
            }
        };

        let Some(refresh_token) = refresh_token else {
            debug!(?reason, "Access token rejected and no refresh token present");
            return self.rejected(reason);
        };

        match self.backend.refresh(&refresh_token).await {
            Ok(RefreshOutcome::Refreshed(grant)) => {
                info!(user_id = %grant.user.id, "Session refreshed");
                self.refreshed(grant)
            }
            Ok(RefreshOutcome::Invalid) => {
                debug!(?reason, "Refresh token rejected");
                self.rejected(reason)
            }
            Err(e) => {
                warn!(error = %e, "Session refresh failed; treating session as invalid");
                let mut resolution = SessionResolution::unauthenticated(SessionState::Invalid, reason);
                resolution.backend_failed = true;
                resolution
            }
        }
    }

    /// Best-effort early refresh of a session close to expiry.
    ///
    /// Returns `None` when there is nothing to refresh or the refresh fails;
    /// the current session stays usable either way.
    pub async fn refresh_proactively(&self, auth: &AuthSession) -> Option<SessionResolution> {
        let refresh_token = auth.session.refresh_token.as_deref()?;

        match self.backend.refresh(refresh_token).await {
            Ok(RefreshOutcome::Refreshed(grant)) => {
                debug!(user_id = %grant.user.id, "Session refreshed ahead of expiry");
                Some(self.refreshed(grant))
            }
            Ok(RefreshOutcome::Invalid) => {
                debug!(user_id = %auth.user.id, "Proactive refresh rejected");
                None
            }
            Err(e) => {
                warn!(error = %e, "Proactive refresh failed");
                None
            }
        }
    }

    /// `Set-Cookie` values for a freshly granted token pair.
    pub fn session_cookies(&self, grant: &TokenGrant) -> Vec<String> {
        vec![
            cookie::serialize(
                &self.settings.access_cookie,
                &grant.access_token,
                &self.cookie_options(self.settings.access_max_age_secs),
            ),
            cookie::serialize(
                &self.settings.refresh_cookie,
                &grant.refresh_token,
                &self.cookie_options(self.settings.refresh_max_age_secs),
            ),
        ]
    }

    /// `Set-Cookie` values removing every session cookie.
    pub fn clear_cookies(&self) -> Vec<String> {
        let options = self.cookie_options(0);
        [
            &self.settings.access_cookie,
            &self.settings.refresh_cookie,
            &self.settings.session_id_cookie,
        ]
        .into_iter()
        .map(|name| cookie::delete_with(name, &options))
        .collect()
    }

    fn cookie_options(&self, max_age_secs: i64) -> CookieOptions {
        CookieOptions::with_max_age(max_age_secs).domain(self.settings.cookie_domain.clone())
    }

    fn refreshed(&self, grant: TokenGrant) -> SessionResolution {
        let set_cookies = self.session_cookies(&grant);
        let session = Session {
            user_id: grant.user.id.clone(),
            access_token: grant.access_token,
            refresh_token: Some(grant.refresh_token),
            expires_at: grant.expires_at,
        };
        let mut resolution = SessionResolution::authenticated(
            SessionState::Refreshed,
            AuthSession {
                user: grant.user,
                session,
                needs_refresh: false,
            },
        );
        resolution.set_cookies = set_cookies;
        resolution
    }

    fn rejected(&self, reason: FailureReason) -> SessionResolution {
        let mut resolution = SessionResolution::unauthenticated(SessionState::Invalid, reason);
        resolution.set_cookies = self.clear_cookies();
        resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::session::backend::SessionBackendError;
    use crate::middleware::session::types::{SessionUser, ValidatedToken};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted backend; counts refresh calls.
    struct FakeBackend {
        validation: fn() -> Result<TokenValidation, SessionBackendError>,
        refresh: fn() -> Result<RefreshOutcome, SessionBackendError>,
        refresh_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new(
            validation: fn() -> Result<TokenValidation, SessionBackendError>,
            refresh: fn() -> Result<RefreshOutcome, SessionBackendError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                validation,
                refresh,
                refresh_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SessionBackend for FakeBackend {
        async fn validate(&self, _: &str) -> Result<TokenValidation, SessionBackendError> {
            (self.validation)()
        }

        async fn refresh(&self, _: &str) -> Result<RefreshOutcome, SessionBackendError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            (self.refresh)()
        }
    }

    fn user() -> SessionUser {
        SessionUser {
            id: "user-1".into(),
            email: Some("founder@example.com".into()),
            role: None,
        }
    }

    fn valid_for(secs: i64) -> Result<TokenValidation, SessionBackendError> {
        Ok(TokenValidation::Valid(ValidatedToken {
            user: user(),
            expires_at: Utc::now() + Duration::seconds(secs),
        }))
    }

    fn granted() -> Result<RefreshOutcome, SessionBackendError> {
        Ok(RefreshOutcome::Refreshed(TokenGrant {
            user: user(),
            access_token: "new-access".into(),
            refresh_token: "new-refresh".into(),
            expires_at: Utc::now() + Duration::hours(1),
        }))
    }

    fn never_refreshes() -> Result<RefreshOutcome, SessionBackendError> {
        Ok(RefreshOutcome::Invalid)
    }

    fn cookies(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn manager(backend: Arc<FakeBackend>) -> SessionManager {
        SessionManager::new(backend, SessionSettings::default())
    }

    #[tokio::test]
    async fn test_no_access_cookie_is_no_session() {
        let backend = FakeBackend::new(|| valid_for(3600), granted);
        let resolution = manager(backend.clone())
            .resolve(&cookies(&[("sb-refresh-token", "rt")]))
            .await;

        assert_eq!(resolution.state, SessionState::NoSession);
        assert_eq!(resolution.failure, Some(FailureReason::Missing));
        assert!(resolution.auth().is_none());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_session_sets_no_cookies() {
        let backend = FakeBackend::new(|| valid_for(1800), granted);
        let resolution = manager(backend)
            .resolve(&cookies(&[("sb-access-token", "at"), ("sb-refresh-token", "rt")]))
            .await;

        assert_eq!(resolution.state, SessionState::Valid);
        assert!(resolution.set_cookies.is_empty());
        let auth = resolution.auth().unwrap();
        assert!(!auth.needs_refresh);
        assert_eq!(auth.user.id, "user-1");
        assert_eq!(auth.session.refresh_token.as_deref(), Some("rt"));
    }

    #[tokio::test]
    async fn test_near_expiry_needs_refresh() {
        let backend = FakeBackend::new(|| valid_for(120), granted);
        let resolution = manager(backend.clone())
            .resolve(&cookies(&[("sb-access-token", "at")]))
            .await;

        assert_eq!(resolution.state, SessionState::ValidNeedsRefresh);
        assert!(resolution.auth().unwrap().needs_refresh);
        assert!(resolution.set_cookies.is_empty());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_access_with_refresh_token_is_refreshed() {
        let backend = FakeBackend::new(|| Ok(TokenValidation::Expired), granted);
        let resolution = manager(backend)
            .resolve(&cookies(&[("sb-access-token", "old"), ("sb-refresh-token", "rt")]))
            .await;

        assert_eq!(resolution.state, SessionState::Refreshed);
        assert_eq!(resolution.set_cookies.len(), 2);
        assert!(resolution.set_cookies[0].starts_with("sb-access-token=new-access;"));
        assert!(resolution.set_cookies[0].contains("Max-Age=3600"));
        assert!(resolution.set_cookies[1].starts_with("sb-refresh-token=new-refresh;"));
        assert!(resolution.set_cookies[1].contains("Max-Age=604800"));
        assert_eq!(resolution.auth().unwrap().session.access_token, "new-access");
    }

    #[tokio::test]
    async fn test_invalid_access_without_refresh_token_is_unauthenticated() {
        let backend = FakeBackend::new(|| Ok(TokenValidation::Invalid), granted);
        let resolution = manager(backend.clone())
            .resolve(&cookies(&[("sb-access-token", "bad")]))
            .await;

        assert_eq!(resolution.state, SessionState::Invalid);
        assert_eq!(resolution.failure, Some(FailureReason::Invalid));
        assert!(resolution.clone().into_auth().is_none());
        assert_eq!(resolution.set_cookies.len(), 3);
        assert!(resolution.set_cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expired_and_refresh_rejected_reports_expiry() {
        let backend = FakeBackend::new(|| Ok(TokenValidation::Expired), never_refreshes);
        let resolution = manager(backend)
            .resolve(&cookies(&[("sb-access-token", "old"), ("sb-refresh-token", "rt")]))
            .await;

        assert_eq!(resolution.state, SessionState::Invalid);
        assert_eq!(resolution.failure, Some(FailureReason::Expired));
    }

    #[tokio::test]
    async fn test_backend_failure_fails_closed_and_keeps_cookies() {
        let backend = FakeBackend::new(|| Err(SessionBackendError::Timeout), granted);
        let resolution = manager(backend.clone())
            .resolve(&cookies(&[("sb-access-token", "at"), ("sb-refresh-token", "rt")]))
            .await;

        assert_eq!(resolution.state, SessionState::Invalid);
        assert!(resolution.backend_failed);
        assert!(resolution.set_cookies.is_empty());
        assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);

        let backend = FakeBackend::new(
            || Ok(TokenValidation::Expired),
            || Err(SessionBackendError::Transport("connection refused".into())),
        );
        let resolution = manager(backend)
            .resolve(&cookies(&[("sb-access-token", "at"), ("sb-refresh-token", "rt")]))
            .await;
        assert_eq!(resolution.state, SessionState::Invalid);
        assert!(resolution.backend_failed);
    }

    #[tokio::test]
    async fn test_proactive_refresh() {
        let backend = FakeBackend::new(|| valid_for(60), granted);
        let manager = manager(backend);
        let resolution = manager
            .resolve(&cookies(&[("sb-access-token", "at"), ("sb-refresh-token", "rt")]))
            .await;
        let auth = resolution.auth().unwrap();

        let refreshed = manager.refresh_proactively(auth).await.unwrap();
        assert_eq!(refreshed.state, SessionState::Refreshed);
        assert_eq!(refreshed.set_cookies.len(), 2);

        let failing = FakeBackend::new(|| valid_for(60), never_refreshes);
        assert!(super::SessionManager::new(failing, SessionSettings::default())
            .refresh_proactively(auth)
            .await
            .is_none());
    }
}
