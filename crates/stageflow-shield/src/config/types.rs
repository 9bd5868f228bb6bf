//! Configuration types.

use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShieldConfig {
    /// Server binding configuration.
    #[serde(default)]
    pub server: ServerSettings,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Origin allow-list.
    #[serde(default)]
    pub cors: CorsSettings,
    /// Double-submit token names.
    #[serde(default)]
    pub csrf: CsrfSettings,
    /// Session cookies and lifetimes.
    #[serde(default)]
    pub session: SessionSettings,
    /// Hosted auth service.
    #[serde(default)]
    pub backend: BackendSettings,
    /// Rollout switches.
    #[serde(default)]
    pub flags: FeatureFlagSettings,
    /// Mount diagnostic endpoints.
    #[serde(default)]
    pub debug_endpoints: bool,
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerSettings {
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (pretty, compact or json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Origin allow-list. The first origin is the canonical one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsSettings {
    #[serde(default = "default_origins", deserialize_with = "comma_list")]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_preview_suffix")]
    pub preview_suffix: Option<String>,
    #[serde(default = "default_preview_marker")]
    pub preview_marker: Option<String>,
    #[serde(default = "default_cors_max_age")]
    pub max_age_secs: u64,
}

fn default_origins() -> Vec<String> {
    vec![
        "https://stageflow.startupstage.com".to_string(),
        "http://localhost:5173".to_string(),
        "http://localhost:8888".to_string(),
    ]
}

fn default_preview_suffix() -> Option<String> {
    Some(".netlify.app".to_string())
}

fn default_preview_marker() -> Option<String> {
    Some("stageflow".to_string())
}

fn default_cors_max_age() -> u64 {
    86400
}

impl Default for CorsSettings {
    fn default() -> Self {
        Self {
            allowed_origins: default_origins(),
            preview_suffix: default_preview_suffix(),
            preview_marker: default_preview_marker(),
            max_age_secs: default_cors_max_age(),
        }
    }
}

/// Double-submit token names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfSettings {
    #[serde(default = "default_csrf_header")]
    pub header_name: String,
    #[serde(default = "default_csrf_cookie")]
    pub cookie_name: String,
}

fn default_csrf_header() -> String {
    crate::middleware::csrf::CSRF_HEADER.to_string()
}

fn default_csrf_cookie() -> String {
    crate::middleware::csrf::CSRF_COOKIE.to_string()
}

impl Default for CsrfSettings {
    fn default() -> Self {
        Self {
            header_name: default_csrf_header(),
            cookie_name: default_csrf_cookie(),
        }
    }
}

/// Session cookie names and lifetimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_access_cookie")]
    pub access_cookie: String,
    #[serde(default = "default_refresh_cookie")]
    pub refresh_cookie: String,
    #[serde(default = "default_session_id_cookie")]
    pub session_id_cookie: String,
    #[serde(default)]
    pub cookie_domain: Option<String>,
    /// Remaining lifetime below which a session needs refreshing.
    #[serde(default = "default_near_expiry")]
    pub near_expiry_secs: i64,
    #[serde(default = "default_access_max_age")]
    pub access_max_age_secs: i64,
    #[serde(default = "default_refresh_max_age")]
    pub refresh_max_age_secs: i64,
    /// Refresh near-expiry sessions during the request.
    #[serde(default = "default_true")]
    pub proactive_refresh: bool,
}

fn default_access_cookie() -> String {
    "sb-access-token".to_string()
}

fn default_refresh_cookie() -> String {
    "sb-refresh-token".to_string()
}

fn default_session_id_cookie() -> String {
    "sb-session-id".to_string()
}

fn default_near_expiry() -> i64 {
    300 // 5 minutes
}

fn default_access_max_age() -> i64 {
    3600 // 1 hour
}

fn default_refresh_max_age() -> i64 {
    604800 // 7 days
}

fn default_true() -> bool {
    true
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_cookie: default_access_cookie(),
            refresh_cookie: default_refresh_cookie(),
            session_id_cookie: default_session_id_cookie(),
            cookie_domain: None,
            near_expiry_secs: default_near_expiry(),
            access_max_age_secs: default_access_max_age(),
            refresh_max_age_secs: default_refresh_max_age(),
            proactive_refresh: true,
        }
    }
}

/// Hosted auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_backend_url")]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_backend_timeout")]
    pub timeout_ms: u64,
}

fn default_backend_url() -> String {
    "http://localhost:54321".to_string()
}

fn default_backend_timeout() -> u64 {
    5000
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            url: default_backend_url(),
            api_key: String::new(),
            timeout_ms: default_backend_timeout(),
        }
    }
}

/// Rollout switches for the request boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlagSettings {
    /// Master switch.
    #[serde(default)]
    pub enabled: bool,
    /// Share of users (0-100) on the new path.
    #[serde(default)]
    pub rollout_percentage: u32,
    #[serde(default, deserialize_with = "comma_list")]
    pub user_whitelist: Vec<String>,
    #[serde(default, deserialize_with = "comma_list")]
    pub user_blacklist: Vec<String>,
    /// Per-endpoint overrides keyed by lowercase endpoint name.
    #[serde(default)]
    pub endpoints: HashMap<String, bool>,
}

/// Accept a list either as a sequence or as a comma-separated string.
fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct CommaList;

    impl<'de> Visitor<'de> for CommaList {
        type Value = Vec<String>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list or a comma-separated string")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
            Ok(value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
            Ok(vec![value.to_string()])
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                out.extend(CommaList.visit_str::<A::Error>(&item)?);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(CommaList)
}
