//! Endpoints mounted behind the request boundary.

use crate::boundary::{Boundary, EndpointPolicy, RequestContext, SessionPolicy, ShieldContext};
use crate::error::{ApiError, ApiResult};
use crate::response::Reply;
use axum::http::{header, Method};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

const MAX_DISPLAY_NAME: usize = 80;

pub fn router(shield: Arc<ShieldContext>) -> Router {
    let mut router = Router::new()
        .route_service(
            "/api/health",
            Boundary::new(shield.clone(), EndpointPolicy::public("health"), health),
        )
        .route_service(
            "/api/auth/csrf",
            Boundary::new(shield.clone(), EndpointPolicy::public("csrf"), issue_csrf),
        )
        .route_service(
            "/api/profile",
            Boundary::new(
                shield.clone(),
                EndpointPolicy::new("profile")
                    .methods([Method::GET, Method::POST])
                    .session(SessionPolicy::Required),
                profile,
            ),
        );

    if shield.config.debug_endpoints {
        router = router.route_service(
            "/api/debug/metrics",
            Boundary::new(shield.clone(), EndpointPolicy::public("debug_metrics"), debug_metrics),
        );
    }

    router
}

async fn health(_ctx: RequestContext) -> ApiResult<Reply<Value>> {
    Ok(Reply::ok(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CsrfTokenBody {
    csrf_token: String,
    header_name: String,
}

async fn issue_csrf(ctx: RequestContext) -> ApiResult<Reply<CsrfTokenBody>> {
    let issued = ctx.shield.csrf.issue();
    let body = CsrfTokenBody {
        csrf_token: issued.token,
        header_name: ctx.shield.csrf.header_name().to_string(),
    };
    Ok(Reply::ok(body)
        .cookie(issued.set_cookie)
        .header(header::CACHE_CONTROL, "no-store"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileBody {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileUpdate {
    display_name: Option<String>,
}

async fn profile(ctx: RequestContext) -> ApiResult<Reply<ProfileBody>> {
    let user = ctx.require_user()?;
    let mut body = ProfileBody {
        id: user.id.clone(),
        email: user.email.clone(),
        display_name: None,
    };

    if ctx.method == Method::POST {
        let update: ProfileUpdate = ctx.json()?;
        let name = update
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::Validation("displayName is required".into()))?;
        if name.chars().count() > MAX_DISPLAY_NAME {
            return Err(ApiError::Validation(format!(
                "displayName must be at most {} characters",
                MAX_DISPLAY_NAME
            ))
            .into());
        }
        body.display_name = Some(name);
        return Ok(Reply::ok(body).message("Profile updated"));
    }

    Ok(Reply::ok(body).header(header::CACHE_CONTROL, "private, no-store"))
}

async fn debug_metrics(ctx: RequestContext) -> ApiResult<Reply<Value>> {
    let metrics = &ctx.shield.metrics;
    Ok(Reply::ok(json!({
        "snapshot": metrics.snapshot(),
        "prometheus": metrics.render_prometheus(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShieldConfig;
    use crate::middleware::session::{
        RefreshOutcome, SessionBackend, SessionBackendError, SessionUser, TokenValidation,
        ValidatedToken,
    };
    use crate::routes::create_router;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct AcceptAll;

    #[async_trait]
    impl SessionBackend for AcceptAll {
        async fn validate(&self, _: &str) -> Result<TokenValidation, SessionBackendError> {
            Ok(TokenValidation::Valid(ValidatedToken {
                user: SessionUser {
                    id: "user-1".into(),
                    email: None,
                    role: None,
                },
                expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            }))
        }

        async fn refresh(&self, _: &str) -> Result<RefreshOutcome, SessionBackendError> {
            Ok(RefreshOutcome::Invalid)
        }
    }

    fn app(debug: bool) -> Router {
        let mut config = ShieldConfig::default();
        config.debug_endpoints = debug;
        create_router(Arc::new(ShieldContext::new(config, Arc::new(AcceptAll))))
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(app(false), get("/api/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "ok");
    }

    #[tokio::test]
    async fn test_debug_endpoint_hidden_unless_enabled() {
        let (status, body) = call(app(false), get("/api/debug/metrics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let response = app(false)
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/nope")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5173");
        assert!(response.headers().contains_key(crate::boundary::REQUEST_ID_HEADER));

        let (status, body) = call(app(true), get("/api/debug/metrics")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["data"]["prometheus"].as_str().unwrap().contains("stageflow_shield"));
    }

    #[tokio::test]
    async fn test_csrf_issue_sets_cookie() {
        let response = app(false).oneshot(get("/api/auth/csrf")).await.unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();

        let token = body["data"]["csrfToken"].as_str().unwrap();
        assert!(cookie.starts_with(&format!("_csrf={};", token)));
    }

    #[tokio::test]
    async fn test_profile_update_validation() {
        let post = |body: &str| {
            Request::builder()
                .method(Method::POST)
                .uri("/api/profile")
                .header(header::COOKIE, "sb-access-token=at; _csrf=t0k")
                .header("X-CSRF-Token", "t0k")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let (status, body) = call(app(false), post(r#"{"displayName":"  "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, body) = call(app(false), post(r#"{"displayName":"Ada"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["displayName"], "Ada");
        assert_eq!(body["message"], "Profile updated");
    }

    #[tokio::test]
    async fn test_default_config_rejects_post_without_csrf() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/profile")
            .header(header::ORIGIN, "https://evil.example.com")
            .header(header::COOKIE, "sb-access-token=at")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"displayName":"pwned"}"#))
            .unwrap();

        let (status, body) = call(app(false), request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "CSRF_INVALID");
    }
}
