//! API error types.

use axum::http::StatusCode;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Result type for handler operations.
pub type ApiResult<T> = Result<T, anyhow::Error>;

/// Stable, client-facing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unauthorized,
    SessionExpired,
    Forbidden,
    NotFound,
    ValidationError,
    RateLimited,
    CsrfInvalid,
    BadRequest,
    MethodNotAllowed,
    ConstraintViolation,
    DatabaseError,
    AiProviderError,
    NetworkError,
    Timeout,
    ConnectionReset,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    InternalError,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 19] = [
        Self::Unauthorized,
        Self::SessionExpired,
        Self::Forbidden,
        Self::NotFound,
        Self::ValidationError,
        Self::RateLimited,
        Self::CsrfInvalid,
        Self::BadRequest,
        Self::MethodNotAllowed,
        Self::ConstraintViolation,
        Self::DatabaseError,
        Self::AiProviderError,
        Self::NetworkError,
        Self::Timeout,
        Self::ConnectionReset,
        Self::BadGateway,
        Self::ServiceUnavailable,
        Self::GatewayTimeout,
        Self::InternalError,
    ];

    /// Wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::RateLimited => "RATE_LIMITED",
            Self::CsrfInvalid => "CSRF_INVALID",
            Self::BadRequest => "BAD_REQUEST",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::ConstraintViolation => "CONSTRAINT_VIOLATION",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::AiProviderError => "AI_PROVIDER_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ConnectionReset => "CONNECTION_RESET",
            Self::BadGateway => "BAD_GATEWAY",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::GatewayTimeout => "GATEWAY_TIMEOUT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Parse a wire code (case-insensitive).
    pub fn parse(code: &str) -> Option<Self> {
        let upper = code.trim().to_ascii_uppercase();
        Self::ALL.iter().copied().find(|c| c.as_str() == upper)
    }

    /// Default HTTP status for this code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized | Self::SessionExpired => StatusCode::UNAUTHORIZED,

            Self::Forbidden | Self::CsrfInvalid => StatusCode::FORBIDDEN,

            Self::NotFound => StatusCode::NOT_FOUND,

            Self::ValidationError
            | Self::BadRequest
            | Self::ConstraintViolation => StatusCode::BAD_REQUEST,

            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,

            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,

            Self::DatabaseError | Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,

            Self::AiProviderError | Self::BadGateway => StatusCode::BAD_GATEWAY,

            Self::NetworkError
            | Self::ConnectionReset
            | Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,

            Self::Timeout | Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Generic human-readable message safe to return to any client.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::Unauthorized => "Authentication required",
            Self::SessionExpired => "Your session has expired, please sign in again",
            Self::Forbidden => "You do not have permission to perform this action",
            Self::NotFound => "The requested resource was not found",
            Self::ValidationError => "The request contains invalid data",
            Self::RateLimited => "Too many requests, please try again later",
            Self::CsrfInvalid => "Invalid or missing CSRF token",
            Self::BadRequest => "The request could not be processed",
            Self::MethodNotAllowed => "Method not allowed",
            Self::ConstraintViolation => "The request conflicts with existing data",
            Self::DatabaseError => "A database error occurred",
            Self::AiProviderError => "The AI provider returned an error",
            Self::NetworkError => "A network error occurred, please try again",
            Self::Timeout => "The request timed out, please try again",
            Self::ConnectionReset => "The connection was reset, please try again",
            Self::BadGateway => "An upstream service returned an invalid response",
            Self::ServiceUnavailable => "The service is temporarily unavailable",
            Self::GatewayTimeout => "An upstream service timed out",
            Self::InternalError => "An internal error occurred",
        }
    }

    /// Code used for an explicit HTTP status with no better information.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(Self::BadRequest),
            401 => Some(Self::Unauthorized),
            403 => Some(Self::Forbidden),
            404 => Some(Self::NotFound),
            405 => Some(Self::MethodNotAllowed),
            409 | 422 => Some(Self::ValidationError),
            429 => Some(Self::RateLimited),
            502 => Some(Self::BadGateway),
            503 => Some(Self::ServiceUnavailable),
            504 => Some(Self::GatewayTimeout),
            s if (400..500).contains(&s) => Some(Self::BadRequest),
            s if (500..600).contains(&s) => Some(Self::InternalError),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Failures handlers raise deliberately.
///
/// Anything else a handler returns travels as a plain [`anyhow::Error`] and is
/// classified from its message chain.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400 Bad Request
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Constraint violation ({sql_state}): {message}")]
    Constraint { sql_state: String, message: String },

    // 401 Unauthorized
    #[error("Authentication required")]
    Unauthorized,

    #[error("Session expired")]
    SessionExpired,

    // 403 Forbidden
    #[error("Access denied: {0}")]
    Forbidden(String),

    // 404 Not Found
    #[error("{0} not found")]
    NotFound(String),

    // 429 Too Many Requests
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<u64> },

    // 500 Internal Server Error
    #[error("Database error: {0}")]
    Database(String),

    // 502 Bad Gateway
    #[error("AI provider error: {0}")]
    AiProvider(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    // 503 Service Unavailable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A failure carrying an explicit HTTP status and optional code.
    #[error("{message}")]
    Status {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl ApiError {
    /// Build a failure with an explicit status.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: None,
            message: message.into(),
        }
    }

    /// Build a failure with an explicit status and code.
    pub fn coded(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            code: Some(code.into()),
            message: message.into(),
        }
    }

    /// Explicit HTTP status attached to the failure, if any.
    pub fn explicit_status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::Unauthorized => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Upstream(_) => Some(502),
            Self::ServiceUnavailable(_) => Some(503),
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Explicit code attached to the failure, if any.
    pub fn explicit_code(&self) -> Option<String> {
        let code = match self {
            Self::SessionExpired => ErrorCode::SessionExpired,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Constraint { .. } => ErrorCode::ConstraintViolation,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::AiProvider(_) => ErrorCode::AiProviderError,
            Self::Status { code, .. } => return code.clone(),
            _ => return None,
        };
        Some(code.as_str().to_string())
    }

    /// Symbolic name of the failure kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BadRequestError",
            Self::Validation(_) => "ValidationError",
            Self::Constraint { .. } => "ConstraintError",
            Self::Unauthorized => "AuthError",
            Self::SessionExpired => "SessionExpiredError",
            Self::Forbidden(_) => "ForbiddenError",
            Self::NotFound(_) => "NotFoundError",
            Self::RateLimited { .. } => "RateLimitError",
            Self::Database(_) => "DatabaseError",
            Self::AiProvider(_) => "AiProviderError",
            Self::Upstream(_) => "UpstreamError",
            Self::ServiceUnavailable(_) => "ServiceUnavailableError",
            Self::Status { .. } => "HttpError",
        }
    }
}
