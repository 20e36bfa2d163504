//! Error types for asset sync runs
//!
//! Per-record and per-batch failures are not errors: they are encoded as
//! values (`Transformed::Skipped`, `DeliveryOutcome`) and aggregated into the
//! run summary. Only failures that make the whole run unusable surface here.

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Main error type for sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// Source rejected the credentials; fatal for the run
    #[error("authentication rejected by source (HTTP {status})")]
    Auth { status: u16 },

    /// A page request failed; pages fetched before it are preserved
    #[error("page request failed (HTTP {status}): {body}")]
    Fetch { status: u16, body: String },

    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a fetch error from a response status and body
    pub fn fetch(status: u16, body: impl Into<String>) -> Self {
        Self::Fetch {
            status,
            body: body.into(),
        }
    }

    /// Whether a retry policy may re-attempt the failed request.
    ///
    /// Transport errors and server-side statuses are worth retrying; rejected
    /// credentials and client-side statuses are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Http(_) => true,
            SyncError::Fetch { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
