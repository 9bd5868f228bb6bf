//! Logging helpers.

pub mod redaction;

pub use redaction::{redact_cookie_header, redact_headers, redact_json, REDACTED};
