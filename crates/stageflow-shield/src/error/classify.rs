//! Failure classification.
//!
//! Arbitrary handler failures are reduced to [`FailureFacts`] (message chain,
//! symbolic name, explicit status and code) and then matched against an
//! ordered rule list. The first matching rule wins.

use super::types::{ApiError, ErrorCode};
use axum::http::StatusCode;
use serde::Serialize;
use std::io;

/// Names of failures that always mean "not authenticated".
const AUTH_ERROR_NAMES: &[&str] = &[
    "AuthError",
    "AuthApiError",
    "AuthSessionMissingError",
    "AuthInvalidTokenResponseError",
    "InvalidToken",
];

/// Names of failures that mean the session is no longer valid.
const SESSION_EXPIRED_NAMES: &[&str] = &["SessionExpiredError", "TokenExpiredError", "ExpiredSignature"];

/// Outcome of classifying a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorClassification {
    /// HTTP status returned to the client.
    #[serde(serialize_with = "serialize_status")]
    pub status_code: StatusCode,
    /// Stable error code.
    pub code: ErrorCode,
    /// Whether the caller may retry.
    pub retryable: bool,
}

fn serialize_status<S: serde::Serializer>(status: &StatusCode, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u16(status.as_u16())
}

impl ErrorClassification {
    /// Classification for a code at its default status.
    pub fn for_code(code: ErrorCode) -> Self {
        Self::new(code.status_code(), code)
    }

    fn new(status_code: StatusCode, code: ErrorCode) -> Self {
        Self {
            status_code,
            code,
            retryable: is_retryable(status_code, code),
        }
    }
}

/// Facts extracted from a failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureFacts {
    /// Full message chain, outermost first.
    pub message: String,
    /// Symbolic name of the failure kind.
    pub name: Option<String>,
    /// Explicit HTTP status.
    pub status: Option<u16>,
    /// Explicit code (taxonomy code or SQL state).
    pub code: Option<String>,
}

impl FailureFacts {
    /// Facts from a bare message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    /// Attach an explicit status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attach an explicit code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Attach a symbolic name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Walk the error chain and collect everything the rules look at.
    ///
    /// The outermost cause that carries a fact wins for that fact.
    pub fn from_error(err: &anyhow::Error) -> Self {
        let mut facts = Self::message(format!("{:#}", err));

        for cause in err.chain() {
            if let Some(api) = cause.downcast_ref::<ApiError>() {
                facts.status = facts.status.or(api.explicit_status());
                facts.code = facts.code.take().or_else(|| api.explicit_code());
                facts.name.get_or_insert_with(|| api.name().to_string());
            } else if let Some(io_err) = cause.downcast_ref::<io::Error>() {
                if let Some(name) = io_kind_name(io_err.kind()) {
                    facts.name.get_or_insert_with(|| name.to_string());
                }
            } else if let Some(http_err) = cause.downcast_ref::<reqwest::Error>() {
                if http_err.is_timeout() {
                    facts.name.get_or_insert_with(|| "ETIMEDOUT".to_string());
                } else if http_err.is_connect() {
                    facts.name.get_or_insert_with(|| "ECONNREFUSED".to_string());
                }
                if let Some(status) = http_err.status() {
                    facts.status = facts.status.or(Some(status.as_u16()));
                }
            } else if cause.downcast_ref::<serde_json::Error>().is_some() {
                facts.name.get_or_insert_with(|| "SyntaxError".to_string());
                facts.status = facts.status.or(Some(400));
            }
        }

        facts
    }
}

fn io_kind_name(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => Some("ECONNRESET"),
        io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
        _ => None,
    }
}

/// Classify an arbitrary failure.
pub fn classify(err: &anyhow::Error) -> ErrorClassification {
    classify_facts(&FailureFacts::from_error(err))
}

/// Classify extracted failure facts.
pub fn classify_facts(facts: &FailureFacts) -> ErrorClassification {
    let (status, code) = match_rules(facts);
    ErrorClassification::new(status, code)
}

fn match_rules(facts: &FailureFacts) -> (StatusCode, ErrorCode) {
    let message = facts.message.to_lowercase();
    let name = facts.name.as_deref().unwrap_or_default();
    let name_lower = name.to_lowercase();
    let status = facts.status;
    let explicit_status = status.and_then(|s| StatusCode::from_u16(s).ok());

    // Explicit taxonomy code.
    if let Some(code) = facts.code.as_deref().and_then(ErrorCode::parse) {
        let status = explicit_status
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or_else(|| code.status_code());
        return (status, code);
    }

    // Explicit gateway statuses.
    match status {
        Some(502) => return (StatusCode::BAD_GATEWAY, ErrorCode::BadGateway),
        Some(503) => return (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable),
        Some(504) => return (StatusCode::GATEWAY_TIMEOUT, ErrorCode::GatewayTimeout),
        _ => {}
    }

    if status == Some(401)
        || contains_any(&message, &["unauthorized", "authentication", "not authenticated"])
        || AUTH_ERROR_NAMES.contains(&name)
    {
        return (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized);
    }

    if SESSION_EXPIRED_NAMES.contains(&name)
        || contains_any(&message, &["session", "token expired", "jwt expired"])
    {
        return (StatusCode::UNAUTHORIZED, ErrorCode::SessionExpired);
    }

    if status == Some(403) || contains_any(&message, &["forbidden", "permission"]) {
        return (StatusCode::FORBIDDEN, ErrorCode::Forbidden);
    }

    if status == Some(404) || contains_any(&message, &["not found", "does not exist"]) {
        return (StatusCode::NOT_FOUND, ErrorCode::NotFound);
    }

    if contains_any(&message, &["validation", "invalid", "required", "missing"]) {
        return (StatusCode::BAD_REQUEST, ErrorCode::ValidationError);
    }

    if status == Some(429) || contains_any(&message, &["rate limit", "too many requests"]) {
        return (StatusCode::TOO_MANY_REQUESTS, ErrorCode::RateLimited);
    }

    match name {
        "ECONNRESET" => return (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ConnectionReset),
        "ECONNREFUSED" => return (StatusCode::SERVICE_UNAVAILABLE, ErrorCode::NetworkError),
        _ => {}
    }
    if contains_any(&message, &["timeout", "etimedout", "timed out", "connection"])
        || name_lower.contains("timeout")
        || name == "ETIMEDOUT"
    {
        return (StatusCode::GATEWAY_TIMEOUT, ErrorCode::Timeout);
    }

    let sql_state = facts
        .code
        .as_deref()
        .map_or(false, |c| c.len() == 5 && c.starts_with("23"));
    if sql_state || message.contains("constraint") {
        return (StatusCode::BAD_REQUEST, ErrorCode::ConstraintViolation);
    }

    if let (Some(explicit), Some(code)) = (explicit_status, status.and_then(ErrorCode::from_status)) {
        return (explicit, code);
    }

    (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError)
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}

/// Whether a failure with this status and code is worth retrying.
///
/// 500 is not retryable: an unclassified failure may already have had a
/// non-idempotent side effect.
pub fn is_retryable(status: StatusCode, code: ErrorCode) -> bool {
    matches!(status.as_u16(), 429 | 502 | 503 | 504)
        || matches!(
            code,
            ErrorCode::NetworkError
                | ErrorCode::Timeout
                | ErrorCode::ConnectionReset
                | ErrorCode::RateLimited
        )
}
