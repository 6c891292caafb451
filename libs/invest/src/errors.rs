use reqwest::StatusCode;
use thiserror::Error;

/// Unified error type for the invest library.
#[derive(Debug, Error)]
pub enum InvestError {
    #[error("api request to {endpoint} failed: {status}")]
    Api { endpoint: String, status: StatusCode },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("storage error: {0}")]
    Store(#[from] sqlx::Error),
}

impl InvestError {
    /// Failures worth another attempt: timeouts, refused connections and 5xx
    /// responses. Request-construction errors repeat identically, so they are
    /// terminal, as are client errors and storage errors.
    pub fn is_transient(&self) -> bool {
        match self {
            InvestError::Api { status, .. } => status.is_server_error(),
            InvestError::Network(e) => e.is_timeout() || e.is_connect(),
            InvestError::Store(_) => false,
        }
    }
}
