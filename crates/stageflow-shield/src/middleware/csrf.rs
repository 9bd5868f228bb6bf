//! Double-submit cookie CSRF protection.
//!
//! A state-changing request must carry the same token in the `X-CSRF-Token`
//! header and in the `_csrf` cookie. Only same-origin script can read the
//! cookie and copy it into the header.

use crate::cookie::{self, CookieOptions};
use axum::http::{HeaderMap, Method};
use rand::RngCore;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Default header carrying the token.
pub const CSRF_HEADER: &str = "X-CSRF-Token";

/// Default cookie carrying the token.
pub const CSRF_COOKIE: &str = "_csrf";

/// Random bytes per issued token.
const TOKEN_BYTES: usize = 32;

/// Why a request failed the CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfRejection {
    #[error("CSRF header missing")]
    MissingHeader,
    #[error("CSRF cookie missing")]
    MissingCookie,
    #[error("CSRF header is not valid text")]
    Malformed,
    #[error("CSRF token length mismatch")]
    LengthMismatch,
    #[error("CSRF token mismatch")]
    Mismatch,
}

/// A freshly issued token and the cookie that carries it.
#[derive(Debug, Clone)]
pub struct CsrfToken {
    pub token: String,
    pub set_cookie: String,
}

/// Stateless double-submit validator.
#[derive(Debug, Clone)]
pub struct CsrfValidator {
    header_name: String,
    cookie_name: String,
    cookie_max_age_secs: i64,
}

impl Default for CsrfValidator {
    fn default() -> Self {
        Self::new(CSRF_HEADER, CSRF_COOKIE, cookie::DEFAULT_MAX_AGE_SECS)
    }
}

impl CsrfValidator {
    pub fn new(header_name: impl Into<String>, cookie_name: impl Into<String>, cookie_max_age_secs: i64) -> Self {
        Self {
            header_name: header_name.into(),
            cookie_name: cookie_name.into(),
            cookie_max_age_secs,
        }
    }

    pub fn header_name(&self) -> &str {
        &self.header_name
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Whether a method changes state and must be checked.
    pub fn requires_check(method: &Method) -> bool {
        !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
    }

    /// Validate the header/cookie pair of a request.
    pub fn validate(&self, headers: &HeaderMap) -> Result<(), CsrfRejection> {
        let header_token = match headers.get(self.header_name.as_str()) {
            None => return Err(CsrfRejection::MissingHeader),
            Some(value) => value.to_str().map_err(|_| CsrfRejection::Malformed)?.trim(),
        };
        if header_token.is_empty() {
            return Err(CsrfRejection::MissingHeader);
        }

        let cookies = cookie::parse_headers(headers);
        let cookie_token = match cookies.get(&self.cookie_name) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(CsrfRejection::MissingCookie),
        };

        compare_tokens(header_token.as_bytes(), cookie_token.as_bytes())
    }

    /// Issue a new random token with its cookie.
    ///
    /// The cookie is readable by script so the page can echo it in the header.
    pub fn issue(&self) -> CsrfToken {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        let options = CookieOptions::with_max_age(self.cookie_max_age_secs).http_only(false);
        let set_cookie = cookie::serialize(&self.cookie_name, &token, &options);

        CsrfToken { token, set_cookie }
    }
}

/// Compare two tokens in constant time.
///
/// Lengths are checked first so the constant-time step only sees equal-length
/// inputs.
pub fn compare_tokens(provided: &[u8], expected: &[u8]) -> Result<(), CsrfRejection> {
    if provided.len() != expected.len() {
        return Err(CsrfRejection::LengthMismatch);
    }
    if bool::from(provided.ct_eq(expected)) {
        Ok(())
    } else {
        Err(CsrfRejection::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};

    fn headers(csrf_header: Option<&str>, cookie: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(token) = csrf_header {
            headers.insert(CSRF_HEADER, HeaderValue::from_str(token).unwrap());
        }
        if let Some(cookie) = cookie {
            headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        headers
    }

    #[test]
    fn test_matching_tokens_accepted() {
        let validator = CsrfValidator::default();
        let h = headers(Some("abc123"), Some("sb-access-token=x; _csrf=abc123"));
        assert_eq!(validator.validate(&h), Ok(()));
    }

    #[test]
    fn test_equal_length_different_tokens_rejected() {
        let validator = CsrfValidator::default();
        let h = headers(Some("abc123"), Some("_csrf=abc124"));
        assert_eq!(validator.validate(&h), Err(CsrfRejection::Mismatch));
    }

    #[test]
    fn test_length_mismatch_short_circuits() {
        assert_eq!(compare_tokens(b"abc", b"abcd"), Err(CsrfRejection::LengthMismatch));
        let validator = CsrfValidator::default();
        let h = headers(Some("abc"), Some("_csrf=abcdef"));
        assert_eq!(validator.validate(&h), Err(CsrfRejection::LengthMismatch));
    }

    #[test]
    fn test_missing_header_or_cookie_rejected() {
        let validator = CsrfValidator::default();
        assert_eq!(
            validator.validate(&headers(None, Some("_csrf=abc"))),
            Err(CsrfRejection::MissingHeader)
        );
        assert_eq!(
            validator.validate(&headers(Some("abc"), None)),
            Err(CsrfRejection::MissingCookie)
        );
        assert_eq!(
            validator.validate(&headers(Some("abc"), Some("_csrf="))),
            Err(CsrfRejection::MissingCookie)
        );
    }

    #[test]
    fn test_non_text_header_rejected() {
        let validator = CsrfValidator::default();
        let mut h = headers(None, Some("_csrf=abc"));
        h.insert(CSRF_HEADER, HeaderValue::from_bytes(&[0xff, 0xfe]).unwrap());
        assert_eq!(validator.validate(&h), Err(CsrfRejection::Malformed));
    }

    #[test]
    fn test_issued_token_validates() {
        let validator = CsrfValidator::default();
        let issued = validator.issue();
        assert_eq!(issued.token.len(), TOKEN_BYTES * 2);
        assert_eq!(hex::decode(&issued.token).unwrap().len(), TOKEN_BYTES);
        assert!(issued.set_cookie.starts_with(&format!("_csrf={};", issued.token)));
        assert!(!issued.set_cookie.contains("HttpOnly"));
        assert!(issued.set_cookie.contains("SameSite=Strict"));

        let h = headers(Some(&issued.token), Some(&format!("_csrf={}", issued.token)));
        assert_eq!(validator.validate(&h), Ok(()));
    }

    #[test]
    fn test_requires_check() {
        assert!(!CsrfValidator::requires_check(&Method::GET));
        assert!(!CsrfValidator::requires_check(&Method::OPTIONS));
        assert!(CsrfValidator::requires_check(&Method::POST));
        assert!(CsrfValidator::requires_check(&Method::DELETE));
    }
}
