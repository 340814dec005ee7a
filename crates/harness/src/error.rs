//! Error types for the scenario harness

use std::time::Duration;

use thiserror::Error;

/// Result type alias using the harness error
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Harness error taxonomy
///
/// Every variant is fatal to the enclosing scenario. There is no local
/// recovery or retry; variants carry enough context (URL, selector,
/// expected vs. actual) to diagnose a failure without re-running.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("no element matched '{selector}' within {timeout:?}")]
    ElementNotFound { selector: String, timeout: Duration },

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("GET {url} failed ({reason})")]
    Request {
        url: String,
        reason: String,
        status: Option<u16>,
    },

    #[error("no ticket parameter in post-login URL: {url}")]
    MissingTicket { url: String },

    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("devtools command '{method}' returned error {code}: {message}")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    #[error("devtools protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarnessError {
    /// Build an assertion failure with expected vs. actual context.
    pub fn assertion(what: &str, expected: impl std::fmt::Display, actual: impl std::fmt::Display) -> Self {
        HarnessError::Assertion(format!("{what}: expected {expected}, got {actual}"))
    }
}
