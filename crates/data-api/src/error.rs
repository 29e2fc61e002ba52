//! Error types for the data API client.

use pocketledger_core::sync::{classify_http_status, FetchOutcome, SendOutcome, SyncRetryClass};
use thiserror::Error;

/// Result type alias for data API operations.
pub type Result<T> = std::result::Result<T, DataApiError>;

/// Errors that can occur while talking to the data API.
///
/// These never leave the client through [`pocketledger_core::sync::RemoteDataApi`];
/// they are folded into fetch/send outcomes at that boundary.
#[derive(Debug, Error)]
pub enum DataApiError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-success response from the API
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (bad configuration, aborted task, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (unusable token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl DataApiError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Classify error for retry policy.
    pub fn retry_class(&self) -> SyncRetryClass {
        match self {
            Self::Api { status, .. } => classify_http_status(*status),
            Self::Http(_) => SyncRetryClass::Retryable,
            Self::Json(_) => SyncRetryClass::Permanent,
            Self::InvalidRequest(_) => SyncRetryClass::Permanent,
            Self::Auth(_) => SyncRetryClass::ReauthRequired,
        }
    }

    pub fn into_fetch_outcome(self) -> FetchOutcome {
        match self {
            Self::Api { status: 404, .. } => FetchOutcome::NotFound,
            Self::Api { status, .. } => FetchOutcome::Rejected { status },
            other => FetchOutcome::TransportFailure(other.to_string()),
        }
    }

    pub fn into_send_outcome(self) -> SendOutcome {
        match self {
            Self::Api { status, .. } => SendOutcome::Rejected { status },
            other => SendOutcome::TransportFailure(other.to_string()),
        }
    }
}
