//! CORS configuration builder.

use super::config::{AllowedOrigins, CorsConfig, PreviewRule};
use crate::config::CorsSettings;
use std::time::Duration;

/// Builder for CORS configuration.
pub struct CorsBuilder {
    config: CorsConfig,
}

impl CorsBuilder {
    pub fn new() -> Self {
        Self {
            config: CorsConfig::default(),
        }
    }

    /// Start from loaded settings.
    pub fn from_settings(settings: &CorsSettings) -> Self {
        let mut origins = AllowedOrigins::new(settings.allowed_origins.iter().cloned());
        if let (Some(suffix), Some(marker)) = (&settings.preview_suffix, &settings.preview_marker) {
            origins = origins.with_preview(PreviewRule {
                suffix: suffix.clone(),
                marker: marker.clone(),
            });
        }

        Self::new()
            .allowed_origins(origins)
            .max_age(Duration::from_secs(settings.max_age_secs))
    }

    /// Set the allowed origins.
    pub fn allowed_origins(mut self, origins: AllowedOrigins) -> Self {
        self.config.allowed_origins = origins;
        self
    }

    /// Set allowed methods.
    pub fn allow_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Set allowed headers.
    pub fn allow_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.allowed_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Allow credentials.
    pub fn allow_credentials(mut self, allow: bool) -> Self {
        self.config.allow_credentials = allow;
        self
    }

    /// Set max age for preflight cache.
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.config.max_age = Some(duration);
        self
    }

    /// Build the CORS configuration.
    pub fn build(self) -> CorsConfig {
        self.config
    }
}

impl Default for CorsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = CorsBuilder::new()
            .allowed_origins(AllowedOrigins::new(["https://example.com", "https://app.example.com"]))
            .allow_methods(["GET", "POST"])
            .allow_credentials(true)
            .max_age(Duration::from_secs(3600))
            .build();

        assert!(config.is_origin_allowed("https://example.com"));
        assert!(!config.is_origin_allowed("https://other.com"));
        assert!(config.allow_credentials);
        assert_eq!(config.allowed_methods, vec!["GET", "POST"]);
    }

    #[test]
    fn test_from_settings_adds_preview_rule() {
        let settings = CorsSettings::default();
        let config = CorsBuilder::from_settings(&settings).build();
        assert!(config.is_origin_allowed("https://deploy-preview-7--stageflow.netlify.app"));
        assert_eq!(
            config.allowed_origins.canonical(),
            Some("https://stageflow.startupstage.com")
        );
    }
}
