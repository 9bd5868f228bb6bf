//! CORS (Cross-Origin Resource Sharing) origin guard.

pub mod builder;
pub mod config;
pub mod guard;

pub use builder::CorsBuilder;
pub use config::{AllowedOrigins, CorsConfig, PreviewRule, DEFAULT_ALLOWED_HEADERS, DEFAULT_ALLOWED_METHODS};
pub use guard::{CorsDecision, OriginGuard};
