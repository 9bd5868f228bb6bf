//! Security middleware components.

pub mod cors;
pub mod csrf;
pub mod logging;
pub mod session;

pub use cors::{AllowedOrigins, CorsBuilder, CorsConfig, CorsDecision, OriginGuard};
pub use csrf::{CsrfRejection, CsrfToken, CsrfValidator};
pub use session::{HttpSessionBackend, SessionBackend, SessionManager, SessionResolution, SessionState};
