//! Management API errors

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur talking to the management API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend answered 404; it predates this endpoint
    #[error("Endpoint not supported by this backend: {0}")]
    Unsupported(String),

    #[error("Invalid response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    pub fn from_reqwest(error: reqwest::Error, timeout_secs: u64) -> Self {
        if error.is_timeout() {
            ApiError::Timeout(timeout_secs)
        } else {
            ApiError::Network(error.to_string())
        }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, ApiError::Unsupported(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Timeout(_))
    }
}

/// Pull a message out of a management error body
///
/// The backend answers with `{"error": "..."}` or `{"message": "..."}`;
/// plain-text bodies are used as-is.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => ["error", "message", "msg"]
            .iter()
            .find_map(|key| json.get(key).and_then(Value::as_str))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

/// Human-readable message for an error shown to the operator
pub fn describe_error(error: &dyn std::error::Error) -> String {
    let message = error.to_string();
    if message.trim().is_empty() {
        "Unknown error".to_string()
    } else {
        message
    }
}
