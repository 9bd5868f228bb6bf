//! Error taxonomy, classification and client-safe shaping.

pub mod classify;
pub mod response;
pub mod sanitize;
pub mod types;

pub use classify::{classify, classify_facts, is_retryable, ErrorClassification, FailureFacts};
pub use response::{failure_response, run_error_hook, ErrorHook, ErrorReport};
pub use sanitize::{is_client_safe, sanitize_message};
pub use types::{ApiError, ApiResult, ErrorCode};
