//! Session validation and refresh.

pub mod backend;
pub mod claims;
pub mod http_backend;
pub mod manager;
pub mod types;

pub use backend::{SessionBackend, SessionBackendError};
pub use claims::{encode_token, read_claims, token_expiry, TokenClaims};
pub use http_backend::HttpSessionBackend;
pub use manager::SessionManager;
pub use types::{
    AuthSession, FailureReason, RefreshOutcome, Session, SessionResolution, SessionState,
    SessionUser, TokenGrant, TokenValidation, ValidatedToken,
};
