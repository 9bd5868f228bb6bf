//! The request boundary service.

use super::context::{RequestContext, ShieldContext};
use super::policy::EndpointPolicy;
use super::stages::{self, append_cookies, CsrfOutcome};
use crate::error::{
    classify, failure_response, run_error_hook, ApiError, ApiResult, ErrorClassification,
    ErrorCode, ErrorReport,
};
use crate::middleware::logging::{redact_headers, redact_json};
use crate::middleware::session::SessionResolution;
use crate::response::{envelope_response, no_content, ApiEnvelope, Reply, SUCCESS_CODE};
use axum::body::{to_bytes, Body};
use axum::http::{request::Parts, HeaderName, HeaderValue, Request};
use axum::response::Response;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;
use tracing::{debug, error, info, warn, Level};
use uuid::Uuid;

/// Correlation header set on every response.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Wraps a handler with CORS, method, CSRF, session and error shaping.
pub struct Boundary<H> {
    shield: Arc<ShieldContext>,
    policy: Arc<EndpointPolicy>,
    handler: H,
}

impl<H: Clone> Clone for Boundary<H> {
    fn clone(&self) -> Self {
        Self {
            shield: self.shield.clone(),
            policy: self.policy.clone(),
            handler: self.handler.clone(),
        }
    }
}

impl<H, Fut, T> Boundary<H>
where
    H: Fn(RequestContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<Reply<T>>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    pub fn new(shield: Arc<ShieldContext>, policy: EndpointPolicy, handler: H) -> Self {
        Self {
            shield,
            policy: Arc::new(policy),
            handler,
        }
    }

    pub fn policy(&self) -> &EndpointPolicy {
        &self.policy
    }

    /// Run the full pipeline. Never fails: every path ends in a response.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let (parts, body) = request.into_parts();

        let cors = self.shield.origins.resolve_headers(&parts.headers);
        if !cors.is_echoed {
            debug!(request_id = %request_id, "Origin not allowed; using canonical origin");
        }
        debug!(
            request_id = %request_id,
            endpoint = %self.policy.name,
            method = %parts.method,
            headers = ?redact_headers(&parts.headers),
            "Request received"
        );

        let method = parts.method.clone();
        let (mut response, code) = self.run(parts, body, &request_id).await;

        self.shield.origins.apply(&cors, response.headers_mut());
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        let status = response.status();
        self.shield.metrics.record_response(status, duration_ms);
        info!(
            request_id = %request_id,
            endpoint = %self.policy.name,
            method = %method,
            status = status.as_u16(),
            code = code.map_or(SUCCESS_CODE, |c| c.as_str()),
            duration_ms,
            "request_completed"
        );

        response
    }

    async fn run(&self, parts: Parts, body: Body, request_id: &str) -> (Response, Option<ErrorCode>) {
        let shield = &self.shield;
        let metrics = &shield.metrics;

        if stages::is_preflight(&parts.method) {
            metrics.record_preflight();
            return (no_content(), None);
        }

        if let Err(rejection) = stages::check_method(&self.policy, &parts.method) {
            metrics.record_method_rejection();
            let code = rejection.code();
            return (rejection.into_response(request_id), Some(code));
        }

        match stages::check_csrf(&shield.csrf, &self.policy, &parts.method, &parts.headers) {
            CsrfOutcome::Rejected(reason) => {
                metrics.record_csrf_rejection();
                warn!(request_id = %request_id, endpoint = %self.policy.name, reason = %reason, "CSRF check failed");
                let rejection = stages::Rejection::Csrf(reason);
                let code = rejection.code();
                return (rejection.into_response(request_id), Some(code));
            }
            CsrfOutcome::Passed | CsrfOutcome::Skipped => {}
        }

        let session_check = stages::check_session(&shield.sessions, &self.policy, &parts.headers);
        let session_stage = AssertUnwindSafe(session_check)
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(request_id = %request_id, endpoint = %self.policy.name, "Session resolution panicked");
                stages::session_unavailable(&self.policy)
            });
        let resolution = match session_stage {
            Ok(resolution) => resolution,
            Err((rejection, resolution)) => {
                record_session_metrics(shield, &resolution);
                metrics.record_unauthenticated();
                let code = rejection.code();
                return (rejection.into_response(request_id), Some(code));
            }
        };
        if let Some(resolution) = &resolution {
            record_session_metrics(shield, resolution);
        }

        let (session_state, session, set_cookies) = match resolution {
            Some(r) => (Some(r.state), r.session, r.set_cookies),
            None => (None, None, Vec::new()),
        };

        let user_id = session.as_ref().map(|s| s.user.id.as_str());
        let flags = shield.flags.decide_for_user(&self.policy.name, user_id);

        let result = match to_bytes(body, shield.config.server.body_limit_bytes).await {
            Ok(bytes) => {
                if tracing::enabled!(Level::DEBUG) && !bytes.is_empty() {
                    log_body(request_id, &bytes);
                }
                let ctx = RequestContext {
                    request_id: request_id.to_string(),
                    endpoint: self.policy.name.clone(),
                    method: parts.method.clone(),
                    uri: parts.uri.clone(),
                    headers: parts.headers.clone(),
                    body: bytes,
                    session,
                    session_state,
                    flags,
                    shield: shield.clone(),
                };
                let handler = self.handler.clone();
                AssertUnwindSafe(async move { handler(ctx).await })
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| Err(HandlerPanic.into()))
            }
            Err(err) => {
                debug!(request_id = %request_id, error = %err, "Failed to read request body");
                Err(ApiError::BadRequest("Request body could not be read".into()).into())
            }
        };

        let (mut response, code) = match result {
            Ok(reply) => {
                metrics.record_success();
                let envelope = ApiEnvelope::success(reply.data, reply.message, request_id);
                let mut response = envelope_response(reply.status, &envelope);
                for (name, value) in reply.headers.iter() {
                    response.headers_mut().append(name.clone(), value.clone());
                }
                (response, None)
            }
            Err(err) => {
                metrics.record_failure();
                let classification = if err.is::<HandlerPanic>() {
                    ErrorClassification::for_code(ErrorCode::InternalError)
                } else {
                    classify(&err)
                };
                self.report(&err, classification, request_id, parts.method.as_str());
                (
                    failure_response(&err, classification, request_id),
                    Some(classification.code),
                )
            }
        };

        append_cookies(response.headers_mut(), &set_cookies);
        (response, code)
    }

    fn report(&self, err: &anyhow::Error, classification: ErrorClassification, request_id: &str, method: &str) {
        let report = ErrorReport::capture(err, classification, request_id, &self.policy.name, method);
        report.log();
        if let Some(hook) = &self.shield.error_hook {
            if !run_error_hook(hook, &report) {
                self.shield.metrics.record_hook_failure();
            }
        }
    }
}

fn log_body(request_id: &str, bytes: &[u8]) {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(mut body) => {
            redact_json(&mut body);
            debug!(request_id = %request_id, body = %body, "Request body");
        }
        Err(_) => debug!(request_id = %request_id, len = bytes.len(), "Request body (not JSON)"),
    }
}

fn record_session_metrics(shield: &ShieldContext, resolution: &SessionResolution) {
    if resolution.backend_failed {
        shield.metrics.record_backend_failure();
    }
    if resolution.state == crate::middleware::session::SessionState::Refreshed {
        shield.metrics.record_refresh();
    }
}

/// A handler panicked.
#[derive(Debug, thiserror::Error)]
#[error("Handler panicked")]
struct HandlerPanic;

impl<H, Fut, T> Service<Request<Body>> for Boundary<H>
where
    H: Fn(RequestContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<Reply<T>>> + Send + 'static,
    T: Serialize + Send + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let boundary = self.clone();
        Box::pin(async move { Ok(boundary.handle(request).await) })
    }
}
