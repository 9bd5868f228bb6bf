//! HTTP routes.

mod api;

use crate::boundary::{Boundary, EndpointPolicy, RequestContext, ShieldContext};
use crate::error::{ApiError, ApiResult};
use crate::response::Reply;
use axum::http::Method;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Create the main application router.
pub fn create_router(shield: Arc<ShieldContext>) -> Router {
    let server = &shield.config.server;
    let common_middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(server.request_timeout_secs)));

    // Unknown paths still get CORS headers and a request id.
    let fallback = Boundary::new(
        shield.clone(),
        EndpointPolicy::public("not_found")
            .methods([
                Method::GET,
                Method::HEAD,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
            ])
            .csrf(false),
        not_found,
    );

    api::router(shield)
        .fallback_service(fallback)
        .layer(common_middleware)
}

async fn not_found(_ctx: RequestContext) -> ApiResult<Reply<()>> {
    Err(ApiError::NotFound("Endpoint".into()).into())
}
