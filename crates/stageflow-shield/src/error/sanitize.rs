//! Client-facing message sanitization.

use super::types::ErrorCode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest message passed through to a client unchanged.
const MAX_CLIENT_MESSAGE_LEN: usize = 200;

static STACK_FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(^\s*at\s+\S+|^\s*\d+:\s+\S+::|stack backtrace|panicked at)").unwrap()
});

static FILE_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(/[\w.\-]+){2,}|[A-Za-z]:\\[\w\\.\-]+|\.(rs|js|ts|py):\d+").unwrap()
});

static DRIVER_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(sqlstate|duplicate key|syntax error at or near|violates .* constraint|relation .* does not exist|pg_|postgres|select\s.+\sfrom|insert\s+into|econn\w+|errno)",
    )
    .unwrap()
});

/// Produce the message returned to the client for a failure.
///
/// Server-side codes always get the generic message for the code. Client-side
/// codes keep the original text only when it carries nothing internal.
pub fn sanitize_message(code: ErrorCode, raw: &str) -> String {
    if code.status_code().is_server_error() || !is_client_safe(raw) {
        return code.default_message().to_string();
    }
    raw.trim().to_string()
}

/// Whether a message is free of stack traces, paths and driver output.
pub fn is_client_safe(message: &str) -> bool {
    let trimmed = message.trim();
    !trimmed.is_empty()
        && trimmed.len() <= MAX_CLIENT_MESSAGE_LEN
        && !trimmed.contains('\n')
        && !STACK_FRAME.is_match(trimmed)
        && !FILE_PATH.is_match(trimmed)
        && !DRIVER_TEXT.is_match(trimmed)
}
