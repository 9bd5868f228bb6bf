//! Response builder utilities.

use super::types::ApiEnvelope;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use serde::Serialize;

/// Successful handler output, shaped into an envelope by the boundary.
#[derive(Debug)]
pub struct Reply<T> {
    pub(crate) status: StatusCode,
    pub(crate) data: Option<T>,
    pub(crate) message: String,
    pub(crate) headers: HeaderMap,
}

impl<T: Serialize> Reply<T> {
    /// 200 with data.
    pub fn ok(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            data: Some(data),
            message: "Success".to_string(),
            headers: HeaderMap::new(),
        }
    }

    /// Set HTTP status code.
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Set the envelope message.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a response header. Invalid values are dropped.
    pub fn header(mut self, name: HeaderName, value: impl AsRef<str>) -> Self {
        if let Ok(v) = HeaderValue::from_str(value.as_ref()) {
            self.headers.append(name, v);
        }
        self
    }

    /// Add a `Set-Cookie` line.
    pub fn cookie(self, set_cookie: impl AsRef<str>) -> Self {
        self.header(header::SET_COOKIE, set_cookie)
    }
}

impl Reply<()> {
    /// 200 without data.
    pub fn empty() -> Self {
        Self {
            status: StatusCode::OK,
            data: None,
            message: "Success".to_string(),
            headers: HeaderMap::new(),
        }
    }
}

/// Serialize an envelope into a JSON response.
pub fn envelope_response<T: Serialize>(status: StatusCode, envelope: &ApiEnvelope<T>) -> Response {
    match serde_json::to_vec(envelope) {
        Ok(body) => json_response(status, body),
        Err(err) => {
            tracing::error!(error = %err, "Failed to serialize response envelope");
            let fallback = serde_json::json!({
                "success": false,
                "code": "INTERNAL_ERROR",
                "message": "An internal error occurred",
                "retryable": false,
                "requestId": envelope.request_id,
            });
            json_response(StatusCode::INTERNAL_SERVER_ERROR, fallback.to_string().into_bytes())
        }
    }
}

fn json_response(status: StatusCode, body: Vec<u8>) -> Response {
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

/// 204 with an empty body.
pub fn no_content() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}
