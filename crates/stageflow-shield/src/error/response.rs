//! Error reporting and response shaping.

use super::{
    classify::{classify, ErrorClassification},
    types::ApiError,
};
use crate::response::{envelope_response, ApiEnvelope};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};
use tracing::{error, warn};
use uuid::Uuid;

/// Number of causes recorded in server-side failure logs.
const LOGGED_CAUSES: usize = 5;

/// Full internal detail of a failure. Never sent to clients.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub request_id: String,
    pub endpoint: String,
    pub method: String,
    pub classification: ErrorClassification,
    /// Full message chain.
    pub message: String,
    /// Outermost causes, at most five.
    pub causes: Vec<String>,
}

impl ErrorReport {
    /// Capture a failure.
    pub fn capture(
        err: &anyhow::Error,
        classification: ErrorClassification,
        request_id: &str,
        endpoint: &str,
        method: &str,
    ) -> Self {
        Self {
            request_id: request_id.to_string(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            classification,
            message: format!("{:#}", err),
            causes: err.chain().take(LOGGED_CAUSES).map(|c| c.to_string()).collect(),
        }
    }

    /// Write the report to the log.
    pub fn log(&self) {
        if self.classification.status_code.is_server_error() {
            error!(
                request_id = %self.request_id,
                endpoint = %self.endpoint,
                method = %self.method,
                status = self.classification.status_code.as_u16(),
                code = %self.classification.code,
                error = %self.message,
                causes = ?self.causes,
                "Request failed"
            );
        } else {
            warn!(
                request_id = %self.request_id,
                endpoint = %self.endpoint,
                method = %self.method,
                status = self.classification.status_code.as_u16(),
                code = %self.classification.code,
                error = %self.message,
                causes = ?self.causes,
                "Request rejected"
            );
        }
    }
}

/// Optional side channel invoked for every classified failure.
pub type ErrorHook = Arc<dyn Fn(&ErrorReport) -> anyhow::Result<()> + Send + Sync>;

/// Run the hook, containing both errors and panics.
///
/// Returns false if the hook failed in any way.
pub fn run_error_hook(hook: &ErrorHook, report: &ErrorReport) -> bool {
    match catch_unwind(AssertUnwindSafe(|| (**hook)(report))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(request_id = %report.request_id, error = %err, "Error hook failed");
            false
        }
        Err(_) => {
            warn!(request_id = %report.request_id, "Error hook panicked");
            false
        }
    }
}

/// Shape a failure into its envelope response.
pub fn failure_response(err: &anyhow::Error, classification: ErrorClassification, request_id: &str) -> Response {
    let envelope = ApiEnvelope::failure(
        classification.code,
        &err.to_string(),
        classification.retryable,
        request_id,
    );
    envelope_response(classification.status_code, &envelope)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = anyhow::Error::new(self);
        let classification = classify(&err);
        let request_id = Uuid::new_v4().to_string();

        ErrorReport::capture(&err, classification, &request_id, "-", "-").log();
        failure_response(&err, classification, &request_id)
    }
}
