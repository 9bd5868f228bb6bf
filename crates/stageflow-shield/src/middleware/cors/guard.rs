//! Origin guard: decides which origin to echo and writes CORS headers.

use super::config::CorsConfig;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Per-request CORS outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsDecision {
    /// Origin written to `Access-Control-Allow-Origin`.
    pub allowed_origin: String,
    /// Whether the request's own origin was echoed back.
    pub is_echoed: bool,
}

/// Validates request origins against the allow-list.
#[derive(Debug, Clone)]
pub struct OriginGuard {
    config: CorsConfig,
}

impl OriginGuard {
    pub fn new(config: CorsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CorsConfig {
        &self.config
    }

    /// Absent origins are never allowed.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        origin.map_or(false, |o| self.config.is_origin_allowed(o))
    }

    /// Echo an allowed origin; anything else gets the canonical origin.
    ///
    /// A concrete origin is always returned since credentialed responses
    /// cannot use a wildcard. Unknown origins are never reflected.
    pub fn resolve(&self, origin: Option<&str>) -> CorsDecision {
        match origin {
            Some(o) if self.config.is_origin_allowed(o) => CorsDecision {
                allowed_origin: o.to_string(),
                is_echoed: true,
            },
            _ => CorsDecision {
                allowed_origin: self
                    .config
                    .allowed_origins
                    .canonical()
                    .unwrap_or_default()
                    .to_string(),
                is_echoed: false,
            },
        }
    }

    /// Resolve from request headers.
    pub fn resolve_headers(&self, headers: &HeaderMap) -> CorsDecision {
        let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
        self.resolve(origin)
    }

    /// Full CORS header set for a decision.
    pub fn headers(&self, decision: &CorsDecision) -> Vec<(HeaderName, HeaderValue)> {
        let mut out = Vec::with_capacity(6);

        if let Ok(origin) = HeaderValue::from_str(&decision.allowed_origin) {
            if !decision.allowed_origin.is_empty() {
                out.push((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin));
                out.push((header::VARY, HeaderValue::from_static("Origin")));
            }
        }
        if let Ok(v) = HeaderValue::from_str(&self.config.allowed_headers.join(", ")) {
            out.push((header::ACCESS_CONTROL_ALLOW_HEADERS, v));
        }
        if let Ok(v) = HeaderValue::from_str(&self.config.allowed_methods.join(", ")) {
            out.push((header::ACCESS_CONTROL_ALLOW_METHODS, v));
        }
        if self.config.allow_credentials {
            out.push((
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ));
        }
        if let Some(max_age) = self.config.max_age {
            out.push((header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(max_age.as_secs())));
        }

        out
    }

    /// Merge CORS headers, keeping any the handler already set.
    pub fn apply(&self, decision: &CorsDecision, headers: &mut HeaderMap) {
        for (name, value) in self.headers(decision) {
            headers.entry(name).or_insert(value);
        }
    }
}
