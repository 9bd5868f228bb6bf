//! Individual pipeline stages.
//!
//! Each stage looks at the request and either lets it continue or produces a
//! terminal [`Rejection`]. None of them touch the handler.

use super::policy::{EndpointPolicy, SessionPolicy};
use crate::error::{is_retryable, ErrorCode};
use crate::middleware::csrf::{CsrfRejection, CsrfValidator};
use crate::middleware::session::{FailureReason, SessionManager, SessionResolution, SessionState};
use crate::response::{envelope_response, ApiEnvelope};
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::Response;
use tracing::{debug, warn};

/// Terminal outcome of a failed stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    MethodNotAllowed { allow: String },
    Csrf(CsrfRejection),
    Unauthenticated {
        code: ErrorCode,
        clear_cookies: Vec<String>,
    },
}

impl Rejection {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MethodNotAllowed { .. } => ErrorCode::MethodNotAllowed,
            Self::Csrf(_) => ErrorCode::CsrfInvalid,
            Self::Unauthenticated { code, .. } => *code,
        }
    }

    /// Envelope response with the fixed status and code of the rejection.
    pub fn into_response(self, request_id: &str) -> Response {
        let code = self.code();
        let status = code.status_code();
        let envelope = ApiEnvelope::from_code(code, is_retryable(status, code), request_id);
        let mut response = envelope_response(status, &envelope);

        match self {
            Self::MethodNotAllowed { allow } => {
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
            }
            Self::Unauthenticated { clear_cookies, .. } => {
                append_cookies(response.headers_mut(), &clear_cookies);
            }
            Self::Csrf(_) => {}
        }
        response
    }
}

/// Append whole `Set-Cookie` values.
pub fn append_cookies(headers: &mut HeaderMap, cookies: &[String]) {
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            headers.append(header::SET_COOKIE, value);
        }
    }
}

pub fn is_preflight(method: &Method) -> bool {
    *method == Method::OPTIONS
}

pub fn check_method(policy: &EndpointPolicy, method: &Method) -> Result<(), Rejection> {
    if policy.allows(method) {
        Ok(())
    } else {
        Err(Rejection::MethodNotAllowed {
            allow: policy.allow_header(),
        })
    }
}

/// Result of the CSRF stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfOutcome {
    /// Safe method or CSRF disabled for the endpoint.
    Skipped,
    Passed,
    Rejected(CsrfRejection),
}

/// Mutating requests are always checked, whatever the rollout flags say.
pub fn check_csrf(
    validator: &CsrfValidator,
    policy: &EndpointPolicy,
    method: &Method,
    headers: &HeaderMap,
) -> CsrfOutcome {
    if !policy.csrf || !CsrfValidator::requires_check(method) {
        return CsrfOutcome::Skipped;
    }

    match validator.validate(headers) {
        Ok(()) => CsrfOutcome::Passed,
        Err(reason) => CsrfOutcome::Rejected(reason),
    }
}

/// Resolve the session according to the endpoint's policy.
///
/// `Ok(None)` means the stage was skipped.
pub async fn check_session(
    manager: &SessionManager,
    policy: &EndpointPolicy,
    headers: &HeaderMap,
) -> Result<Option<SessionResolution>, (Rejection, SessionResolution)> {
    if policy.session == SessionPolicy::Skip {
        return Ok(None);
    }

    let mut resolution = manager.resolve_headers(headers).await;

    if resolution.state == SessionState::ValidNeedsRefresh && manager.settings().proactive_refresh {
        if let Some(auth) = resolution.auth() {
            if let Some(refreshed) = manager.refresh_proactively(auth).await {
                resolution = refreshed;
            }
        }
    }

    if resolution.auth().is_some() || policy.session == SessionPolicy::Optional {
        return Ok(Some(resolution));
    }

    let code = match resolution.failure {
        Some(FailureReason::Expired) => ErrorCode::SessionExpired,
        _ => ErrorCode::Unauthorized,
    };
    debug!(state = ?resolution.state, code = %code, "No valid session");
    if resolution.backend_failed {
        warn!(endpoint = %policy.name, "Session backend unavailable; request rejected");
    }

    let rejection = Rejection::Unauthenticated {
        code,
        clear_cookies: resolution.set_cookies.clone(),
    };
    Err((rejection, resolution))
}

/// Outcome when session resolution itself broke down.
///
/// Treated like a backend outage: no session and no cookies cleared.
pub fn session_unavailable(
    policy: &EndpointPolicy,
) -> Result<Option<SessionResolution>, (Rejection, SessionResolution)> {
    let mut resolution = SessionResolution::unauthenticated(SessionState::Invalid, FailureReason::Invalid);
    resolution.backend_failed = true;
    if policy.session == SessionPolicy::Optional {
        return Ok(Some(resolution));
    }
    let rejection = Rejection::Unauthenticated {
        code: ErrorCode::Unauthorized,
        clear_cookies: Vec::new(),
    };
    Err((rejection, resolution))
}
