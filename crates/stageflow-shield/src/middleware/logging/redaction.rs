//! Redaction of credentials before they reach the logs.

use axum::http::{header, HeaderMap};

pub const REDACTED: &str = "[REDACTED]";

/// Headers whose values are always hidden.
pub const SENSITIVE_HEADERS: &[&str] = &["authorization", "set-cookie", "x-csrf-token", "apikey"];

/// JSON keys (substring match) whose values are hidden.
pub const SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "api_key", "csrf"];

/// Cookie header with names kept and every value hidden.
pub fn redact_cookie_header(raw: &str) -> String {
    raw.split(';')
        .filter_map(|segment| segment.split_once('=').map(|(name, _)| name.trim()))
        .filter(|name| !name.is_empty())
        .map(|name| format!("{}={}", name, REDACTED))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Header list safe to log.
///
/// `Cookie` keeps the cookie names so a missing session or CSRF cookie can
/// still be diagnosed.
pub fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if *name == header::COOKIE {
                value
                    .to_str()
                    .map(redact_cookie_header)
                    .unwrap_or_else(|_| REDACTED.to_string())
            } else if SENSITIVE_HEADERS.contains(&name.as_str()) {
                REDACTED.to_string()
            } else {
                value.to_str().unwrap_or("[non-utf8]").to_string()
            };
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Redact sensitive fields from a JSON value in place.
pub fn redact_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| key_lower.contains(f)) {
                    *val = serde_json::Value::String(REDACTED.to_string());
                } else {
                    redact_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => arr.iter_mut().for_each(redact_json),
        _ => {}
    }
}
