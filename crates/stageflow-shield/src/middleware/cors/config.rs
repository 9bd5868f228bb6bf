//! CORS configuration types.

use std::time::Duration;

/// Headers a browser may send on cross-origin calls.
pub const DEFAULT_ALLOWED_HEADERS: &[&str] = &[
    "Content-Type",
    "Authorization",
    "X-CSRF-Token",
    "X-Requested-With",
    "Accept",
];

/// Methods advertised to browsers.
pub const DEFAULT_ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// CORS configuration.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Allowed origins.
    pub allowed_origins: AllowedOrigins,
    /// Allowed methods, in advertised order.
    pub allowed_methods: Vec<String>,
    /// Allowed request headers, in advertised order.
    pub allowed_headers: Vec<String>,
    /// Allow credentials (cookies).
    pub allow_credentials: bool,
    /// Max age for preflight cache.
    pub max_age: Option<Duration>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: AllowedOrigins::default(),
            allowed_methods: DEFAULT_ALLOWED_METHODS.iter().map(|s| s.to_string()).collect(),
            allowed_headers: DEFAULT_ALLOWED_HEADERS.iter().map(|s| s.to_string()).collect(),
            allow_credentials: true,
            max_age: Some(Duration::from_secs(86400)), // 24 hours
        }
    }
}

impl CorsConfig {
    /// Check if origin is allowed.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.is_allowed(origin)
    }
}

/// Rule admitting ephemeral preview deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRule {
    /// Hosting platform suffix, e.g. `.netlify.app`.
    pub suffix: String,
    /// Product marker that must appear in the host, e.g. `stageflow`.
    pub marker: String,
}

impl PreviewRule {
    /// Whether an origin is a preview deployment of the product.
    ///
    /// The suffix must end the host and the marker must appear in it.
    pub fn matches(&self, origin: &str) -> bool {
        let Ok(url) = url::Url::parse(origin) else {
            return false;
        };
        if url.scheme() != "https" {
            return false;
        }
        match url.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                host.ends_with(&self.suffix.to_ascii_lowercase())
                    && host.contains(&self.marker.to_ascii_lowercase())
            }
            None => false,
        }
    }
}

/// Allowed origins: exact matches plus an optional preview rule.
///
/// The first exact origin is the canonical production origin.
#[derive(Debug, Clone, Default)]
pub struct AllowedOrigins {
    exact: Vec<String>,
    preview: Option<PreviewRule>,
}

impl AllowedOrigins {
    /// Build from an ordered origin list.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exact: origins
                .into_iter()
                .map(|o| o.into().trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            preview: None,
        }
    }

    /// Attach the preview deployment rule.
    pub fn with_preview(mut self, rule: PreviewRule) -> Self {
        self.preview = Some(rule);
        self
    }

    /// Check if origin is allowed.
    pub fn is_allowed(&self, origin: &str) -> bool {
        if origin.is_empty() {
            return false;
        }
        self.exact.iter().any(|o| o == origin)
            || self.preview.as_ref().map_or(false, |rule| rule.matches(origin))
    }

    /// The canonical origin echoed for unrecognized callers.
    pub fn canonical(&self) -> Option<&str> {
        self.exact.first().map(String::as_str)
    }

    /// Exact origins in configured order.
    pub fn exact(&self) -> &[String] {
        &self.exact
    }
}
