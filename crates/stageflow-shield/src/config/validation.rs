//! Configuration validation.

use super::types::ShieldConfig;
use thiserror::Error;

/// Longest cookie lifetime accepted (400 days, the browser cap).
pub const MAX_COOKIE_AGE_SECS: i64 = 400 * 24 * 60 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("At least one allowed origin is required")]
    NoAllowedOrigins,

    #[error("Invalid allowed origin: {0}")]
    InvalidOrigin(String),

    #[error("Rollout percentage must be between 0 and 100, got {0}")]
    InvalidRolloutPercentage(u32),

    #[error("Cookie lifetime for {0} must be between 1 second and 400 days")]
    InvalidCookieLifetime(&'static str),

    #[error("Near-expiry window must be shorter than the access token lifetime")]
    NearExpiryTooLong,

    #[error("Session backend URL is invalid: {0}")]
    InvalidBackendUrl(String),

    #[error("Session backend timeout must be positive")]
    InvalidBackendTimeout,

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

/// Validate configuration, reporting every problem found.
pub fn validate_config(config: &ShieldConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.cors.allowed_origins.is_empty() {
        errors.push(ConfigError::NoAllowedOrigins);
    }
    for origin in &config.cors.allowed_origins {
        let valid = url::Url::parse(origin)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false);
        if !valid {
            errors.push(ConfigError::InvalidOrigin(origin.clone()));
        }
    }

    if config.flags.rollout_percentage > 100 {
        errors.push(ConfigError::InvalidRolloutPercentage(config.flags.rollout_percentage));
    }

    let session = &config.session;
    if !(1..=MAX_COOKIE_AGE_SECS).contains(&session.access_max_age_secs) {
        errors.push(ConfigError::InvalidCookieLifetime("access token"));
    }
    if !(1..=MAX_COOKIE_AGE_SECS).contains(&session.refresh_max_age_secs) {
        errors.push(ConfigError::InvalidCookieLifetime("refresh token"));
    }
    if session.near_expiry_secs >= session.access_max_age_secs {
        errors.push(ConfigError::NearExpiryTooLong);
    }

    if url::Url::parse(&config.backend.url).is_err() {
        errors.push(ConfigError::InvalidBackendUrl(config.backend.url.clone()));
    }
    if config.backend.timeout_ms == 0 {
        errors.push(ConfigError::InvalidBackendTimeout);
    }

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }
    let valid_formats = ["pretty", "compact", "json"];
    if !valid_formats.contains(&config.logging.format.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogFormat(config.logging.format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
