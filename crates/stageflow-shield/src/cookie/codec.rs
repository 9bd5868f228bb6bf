//! Cookie header parsing and `Set-Cookie` serialization.

use super::options::CookieOptions;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

/// IMF-fixdate layout used by the `Expires` attribute.
const EXPIRES_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Parse a raw `Cookie` header into a name to value map.
///
/// Segments without `=` are skipped. Values are percent-decoded; a value that
/// fails to decode is kept as sent. Later duplicates overwrite earlier ones.
pub fn parse(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for segment in header.split(';') {
        let Some((name, value)) = segment.split_once('=') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        let decoded = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        cookies.insert(name.to_string(), decoded);
    }

    cookies
}

/// Parse every `Cookie` header of a request.
///
/// Non-UTF-8 header values are ignored.
pub fn parse_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let joined = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join("; ");
    parse(&joined)
}

/// Serialize a cookie into a `Set-Cookie` header value.
pub fn serialize(name: &str, value: &str, options: &CookieOptions) -> String {
    serialize_at(name, value, options, Utc::now())
}

/// Serialize with an explicit clock for the `Expires` attribute.
pub fn serialize_at(name: &str, value: &str, options: &CookieOptions, now: DateTime<Utc>) -> String {
    let mut out = format!("{}={}", name, urlencoding::encode(value));

    if options.http_only {
        out.push_str("; HttpOnly");
    }
    if options.secure {
        out.push_str("; Secure");
    }
    if let Some(same_site) = options.same_site {
        out.push_str(&format!("; SameSite={}", same_site));
    }
    if let Some(max_age) = options.max_age_secs {
        out.push_str(&format!("; Max-Age={}", max_age.max(0)));
        let expires = if max_age > 0 {
            Duration::try_seconds(max_age).and_then(|delta| now.checked_add_signed(delta))
        } else {
            Utc.timestamp_opt(0, 0).single()
        };
        // Past the representable range Max-Age alone carries the lifetime.
        if let Some(expires) = expires {
            out.push_str(&format!("; Expires={}", expires.format(EXPIRES_FORMAT)));
        }
    }
    if let Some(path) = &options.path {
        out.push_str(&format!("; Path={}", path));
    }
    if let Some(domain) = &options.domain {
        out.push_str(&format!("; Domain={}", domain));
    }

    out
}

/// `Set-Cookie` value that removes a cookie.
pub fn delete(name: &str) -> String {
    delete_with(name, &CookieOptions::default())
}

/// Removal instruction keeping the path/domain scope of `options`.
pub fn delete_with(name: &str, options: &CookieOptions) -> String {
    let options = CookieOptions {
        max_age_secs: Some(0),
        ..options.clone()
    };
    serialize(name, "", &options)
}
