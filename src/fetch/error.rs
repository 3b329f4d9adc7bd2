// src/fetch/error.rs
use thiserror::Error;

/// Failure taxonomy for every upstream call.
///
/// `Clone` because a single failed request is handed to every caller that
/// was coalesced onto it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Upstream says the resource does not exist. Terminal, never retried.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Upstream throttling (HTTP 429).
    #[error("rate limited by upstream")]
    RateLimited,

    /// Network-level failure: connect, DNS, timeout, truncated body.
    #[error("transport failure: {0}")]
    Transient(String),

    /// Any other non-success status.
    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16 },

    /// Success status but the body could not be decoded.
    #[error("could not decode upstream payload: {0}")]
    Decode(String),

    /// Retry budget exhausted; carries the last observed error.
    #[error("request failed after {attempts} attempt(s): {last}")]
    RequestFailed {
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn is_not_found(&self) -> bool {
        match self {
            FetchError::NotFound(_) => true,
            FetchError::RequestFailed { last, .. } => last.is_not_found(),
            _ => false,
        }
    }

    /// Everything except not-found may be retried within the attempt budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::NotFound(_) => false,
            FetchError::RequestFailed { .. } => false,
            FetchError::RateLimited
            | FetchError::Transient(_)
            | FetchError::Upstream { .. }
            | FetchError::Decode(_) => true,
        }
    }

    /// Short label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::NotFound(_) => "not_found",
            FetchError::RateLimited => "rate_limited",
            FetchError::Transient(_) => "transient",
            FetchError::Upstream { .. } => "upstream",
            FetchError::Decode(_) => "decode",
            FetchError::RequestFailed { last, .. } => last.kind(),
        }
    }

    /// Message suitable for the UI: "does not exist" vs "try again later".
    pub fn user_message(&self) -> &'static str {
        if self.is_not_found() {
            "The requested resource does not exist."
        } else {
            "Live data is temporarily unavailable. Please try again shortly."
        }
    }
}
