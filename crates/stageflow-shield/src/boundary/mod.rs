//! Request boundary: the pipeline every endpoint runs through.
//!
//! `CORS → method → CSRF → session → handler → error shaping`, with early
//! exits. CORS headers and a request id land on every response.

pub mod context;
pub mod policy;
pub mod service;
pub mod stages;

pub use context::{RequestContext, ShieldContext};
pub use policy::{EndpointPolicy, SessionPolicy};
pub use service::{Boundary, REQUEST_ID_HEADER};
pub use stages::{CsrfOutcome, Rejection};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use crate::error::{ApiError, ApiResult, ErrorHook, ErrorReport};
    use crate::flags::FeatureFlags;
    use crate::middleware::session::{
        RefreshOutcome, SessionBackend, SessionBackendError, SessionUser, TokenGrant,
        TokenValidation, ValidatedToken,
    };
    use crate::response::Reply;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::response::Response;
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::convert::Infallible;
    use std::sync::Arc;
    use tower::{Service, ServiceExt};

    const ORIGIN: &str = "https://stageflow.startupstage.com";

    /// Tokens: `good` (1h left), `soon` (2 min left), `stale` (expired);
    /// refresh token `rt-good` refreshes, anything else is rejected.
    struct TokenTable;

    fn user() -> SessionUser {
        SessionUser {
            id: "user-1".into(),
            email: Some("founder@example.com".into()),
            role: None,
        }
    }

    #[async_trait]
    impl SessionBackend for TokenTable {
        async fn validate(&self, token: &str) -> Result<TokenValidation, SessionBackendError> {
            let valid_for = |secs| {
                TokenValidation::Valid(ValidatedToken {
                    user: user(),
                    expires_at: Utc::now() + Duration::seconds(secs),
                })
            };
            Ok(match token {
                "good" | "fresh" => valid_for(3600),
                "soon" => valid_for(120),
                "stale" => TokenValidation::Expired,
                "down" => return Err(SessionBackendError::Timeout),
                _ => TokenValidation::Invalid,
            })
        }

        async fn refresh(&self, token: &str) -> Result<RefreshOutcome, SessionBackendError> {
            Ok(match token {
                "rt-good" => RefreshOutcome::Refreshed(TokenGrant {
                    user: user(),
                    access_token: "fresh".into(),
                    refresh_token: "rt-next".into(),
                    expires_at: Utc::now() + Duration::hours(1),
                }),
                _ => RefreshOutcome::Invalid,
            })
        }
    }

    fn shield() -> Arc<ShieldContext> {
        Arc::new(
            ShieldContext::new(ShieldConfig::default(), Arc::new(TokenTable))
                .with_flags(FeatureFlags::all_on()),
        )
    }

    async fn profile_handler(ctx: RequestContext) -> ApiResult<Reply<Value>> {
        let user = ctx.require_user()?;
        Ok(Reply::ok(json!({ "id": user.id })).header(header::CACHE_CONTROL, "no-store"))
    }

    fn profile(
        shield: Arc<ShieldContext>,
    ) -> impl Service<Request<Body>, Response = Response, Error = Infallible> {
        Boundary::new(
            shield,
            EndpointPolicy::new("profile").methods([Method::GET, Method::POST]),
            profile_handler,
        )
    }

    fn request(method: Method, cookie: Option<&str>, csrf: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri("/api/profile")
            .header(header::ORIGIN, ORIGIN);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(token) = csrf {
            builder = builder.header("X-CSRF-Token", token);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookies(response: &Response) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_preflight_is_204_with_cors() {
        let response = profile(shield())
            .oneshot(request(Method::OPTIONS, None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_method_is_405() {
        let response = profile(shield())
            .oneshot(request(Method::DELETE, Some("sb-access-token=good"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, POST, OPTIONS");
        assert_eq!(body_json(response).await["code"], "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_csrf_failure_is_403_before_session() {
        let shield = shield();
        let response = profile(shield.clone())
            .oneshot(request(Method::POST, Some("sb-access-token=good; _csrf=aaaa"), Some("bbbb")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
        let body = body_json(response).await;
        assert_eq!(body["code"], "CSRF_INVALID");
        assert_eq!(body["success"], false);
        assert_eq!(shield.metrics.snapshot().csrf_rejections, 1);
    }

    #[tokio::test]
    async fn test_csrf_enforced_with_default_flags() {
        let shield = Arc::new(ShieldContext::new(ShieldConfig::default(), Arc::new(TokenTable)));
        let response = profile(shield.clone())
            .oneshot(request(Method::POST, Some("sb-access-token=good"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["code"], "CSRF_INVALID");
        assert_eq!(shield.metrics.snapshot().csrf_rejections, 1);
    }

    #[tokio::test]
    async fn test_csrf_enforced_during_partial_rollout() {
        let mut config = ShieldConfig::default();
        config.flags.enabled = true;
        config.flags.rollout_percentage = 50;
        config.flags.user_whitelist = vec!["user-1".into()];
        let shield = Arc::new(ShieldContext::new(config, Arc::new(TokenTable)));

        let response = profile(shield.clone())
            .oneshot(request(Method::POST, Some("sb-access-token=good"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let seen = Arc::new(std::sync::Mutex::new(None));
        let recorded = seen.clone();
        let boundary = Boundary::new(
            shield,
            EndpointPolicy::new("profile").methods([Method::POST]),
            move |ctx: RequestContext| {
                let recorded = recorded.clone();
                async move {
                    *recorded.lock().unwrap() = Some(ctx.flags.use_new_middleware);
                    Ok::<_, anyhow::Error>(Reply::<()>::empty())
                }
            },
        );
        let response = boundary
            .oneshot(request(Method::POST, Some("sb-access-token=good; _csrf=tok"), Some("tok")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*seen.lock().unwrap(), Some(true));
    }

    struct PanickingBackend;

    #[async_trait]
    impl SessionBackend for PanickingBackend {
        async fn validate(&self, _: &str) -> Result<TokenValidation, SessionBackendError> {
            panic!("backend payload out of range")
        }

        async fn refresh(&self, _: &str) -> Result<RefreshOutcome, SessionBackendError> {
            panic!("backend payload out of range")
        }
    }

    #[tokio::test]
    async fn test_session_stage_panic_fails_closed_with_envelope() {
        let shield = Arc::new(ShieldContext::new(ShieldConfig::default(), Arc::new(PanickingBackend)));
        let response = profile(shield.clone())
            .oneshot(request(Method::GET, Some("sb-access-token=good"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert!(set_cookies(&response).is_empty());
        assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
        assert_eq!(shield.metrics.snapshot().backend_failures, 1);
    }

    #[tokio::test]
    async fn test_valid_post_succeeds_without_cookies() {
        let response = profile(shield())
            .oneshot(request(Method::POST, Some("sb-access-token=good; _csrf=tok123"), Some("tok123")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["code"], "OK");
        assert_eq!(body["data"]["id"], "user-1");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_missing_session_is_401() {
        let response = profile(shield())
            .oneshot(request(Method::GET, None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_expired_without_refresh_is_session_expired() {
        let response = profile(shield())
            .oneshot(request(Method::GET, Some("sb-access-token=stale"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(set_cookies(&response).len(), 3);
        assert_eq!(body_json(response).await["code"], "SESSION_EXPIRED");
    }

    #[tokio::test]
    async fn test_backend_outage_fails_closed() {
        let shield = shield();
        let response = profile(shield.clone())
            .oneshot(request(Method::GET, Some("sb-access-token=down"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(set_cookies(&response).is_empty());
        assert_eq!(shield.metrics.snapshot().backend_failures, 1);
    }

    #[tokio::test]
    async fn test_refresh_sets_two_cookies() {
        let response = profile(shield())
            .oneshot(request(Method::GET, Some("sb-access-token=stale; sb-refresh-token=rt-good"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookies(&response);
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("sb-access-token=fresh;"));
        assert!(cookies[1].starts_with("sb-refresh-token=rt-next;"));
    }

    #[tokio::test]
    async fn test_near_expiry_refreshes_proactively() {
        let response = profile(shield())
            .oneshot(request(Method::GET, Some("sb-access-token=soon; sb-refresh-token=rt-good"), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(set_cookies(&response).len(), 2);

        let response = profile(shield())
            .oneshot(request(Method::GET, Some("sb-access-token=soon"), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(set_cookies(&response).is_empty());
    }

    #[tokio::test]
    async fn test_handler_errors_are_classified_and_hooked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let hook: ErrorHook = Arc::new(move |report: &ErrorReport| -> anyhow::Result<()> {
            assert_eq!(report.endpoint, "plans");
            seen.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("sink offline"))
        });
        let shield = Arc::new(
            ShieldContext::new(ShieldConfig::default(), Arc::new(TokenTable)).with_error_hook(hook),
        );

        let boundary = Boundary::new(shield.clone(), EndpointPolicy::public("plans"), |_ctx: RequestContext| async {
            Err::<Reply<()>, anyhow::Error>(ApiError::status(503, "pool exhausted at /srv/app/db.rs:42").into())
        });
        let response = boundary.oneshot(request(Method::GET, None, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
        let body = body_json(response).await;
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
        assert_eq!(body["retryable"], true);
        assert!(!body["message"].as_str().unwrap().contains("/srv"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(shield.metrics.snapshot().hook_failures, 1);
    }

    #[tokio::test]
    async fn test_handler_panic_is_internal_error() {
        let boundary = Boundary::new(shield(), EndpointPolicy::public("ideas"), |_ctx: RequestContext| async {
            if true {
                panic!("invalid state");
            }
            Ok::<_, anyhow::Error>(Reply::empty())
        });
        let response = boundary.oneshot(request(Method::GET, None, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_handler_headers_are_not_overwritten() {
        let boundary = Boundary::new(shield(), EndpointPolicy::public("embed"), |_ctx: RequestContext| async {
            Ok::<_, anyhow::Error>(Reply::empty().header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        });
        let response = boundary.oneshot(request(Method::GET, None, None)).await.unwrap();

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn test_unknown_origin_gets_canonical() {
        let boundary = Boundary::new(shield(), EndpointPolicy::public("health"), |_ctx: RequestContext| async {
            Ok::<_, anyhow::Error>(Reply::empty())
        });
        let request = Request::builder()
            .uri("/api/health")
            .header(header::ORIGIN, "https://evil.example.com")
            .body(Body::empty())
            .unwrap();
        let response = boundary.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], ORIGIN);
    }
}
