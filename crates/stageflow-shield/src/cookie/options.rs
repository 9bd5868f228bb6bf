//! Cookie attribute options.

use std::fmt;

/// Default cookie lifetime in seconds.
pub const DEFAULT_MAX_AGE_SECS: i64 = 3600;

/// `SameSite` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        })
    }
}

/// Attributes attached to a `Set-Cookie` instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
    pub max_age_secs: Option<i64>,
    pub path: Option<String>,
    pub domain: Option<String>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            http_only: true,
            secure: true,
            same_site: Some(SameSite::Strict),
            max_age_secs: Some(DEFAULT_MAX_AGE_SECS),
            path: Some("/".to_string()),
            domain: None,
        }
    }
}

impl CookieOptions {
    /// Secure defaults with a specific lifetime.
    pub fn with_max_age(max_age_secs: i64) -> Self {
        Self {
            max_age_secs: Some(max_age_secs),
            ..Self::default()
        }
    }

    /// Set the domain attribute.
    pub fn domain(mut self, domain: Option<String>) -> Self {
        self.domain = domain;
        self
    }

    /// Toggle the HttpOnly attribute.
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }
}
