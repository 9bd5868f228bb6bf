//! Standard API response envelope.

use crate::error::{sanitize_message, ErrorCode};
use serde::{Deserialize, Serialize};

/// Code carried by every successful envelope.
pub const SUCCESS_CODE: &str = "OK";

/// Uniform JSON body returned by every endpoint, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEnvelope<T> {
    /// Whether the request was successful.
    pub success: bool,
    /// Machine-readable outcome code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether a failed request may be retried. Always false on success.
    pub retryable: bool,
    /// Response data (success only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Correlation identifier for log lookups.
    pub request_id: String,
}

impl<T> ApiEnvelope<T> {
    /// Build a successful envelope.
    pub fn success(data: Option<T>, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            success: true,
            code: SUCCESS_CODE.to_string(),
            message: message.into(),
            retryable: false,
            data,
            request_id: request_id.into(),
        }
    }
}

impl ApiEnvelope<()> {
    /// Build a failure envelope; the message is sanitized for `code`.
    pub fn failure(
        code: ErrorCode,
        raw_message: &str,
        retryable: bool,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            success: false,
            code: code.as_str().to_string(),
            message: sanitize_message(code, raw_message),
            retryable,
            data: None,
            request_id: request_id.into(),
        }
    }

    /// Failure envelope with the generic message for `code`.
    pub fn from_code(code: ErrorCode, retryable: bool, request_id: impl Into<String>) -> Self {
        Self::failure(code, code.default_message(), retryable, request_id)
    }
}
