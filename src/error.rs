//! Error handling for ecops
//!
//! Defines the domain error types callers match on and establishes a unified
//! Result type using anyhow for context chaining and error propagation.

use thiserror::Error;

/// Core error types for warehouse and accounting operations
#[derive(Error, Debug)]
pub enum OpsError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("warehouse error ({status}): {message}")]
    Warehouse { status: u16, message: String },

    #[error("scheduler error ({status}): {message}")]
    Scheduler { status: u16, message: String },

    #[error("accounting error: {0}")]
    Accounting(String),

    #[error("invalid month '{0}': expected YYYY-MM")]
    InvalidMonth(String),

    #[error("io error")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ecops operations
pub type Result<T> = anyhow::Result<T>;

/// Pull the human-readable message out of a Google API error body
/// (`{"error": {"code": .., "message": ..}}`), falling back to the raw text.
pub fn google_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
