//! Error taxonomy for planning, fetching and exporting feeds.
//!
//! Fetch failures come in two flavours:
//! - [`FetchError::Auth`]: the credential is missing or rejected. Retrying or
//!   moving on to the next chunk cannot help, so the scheduler aborts the run.
//! - [`FetchError::Transient`]: anything else (network, rate limit, malformed
//!   response). Counted against the chunk and the run continues.
//!
//! [`FeedError`] is what the top level sees.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static AUTH_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(401|403)\b").expect("valid auth status regex"));

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Missing or rejected credential.
    #[error("authorization failed: {0}")]
    Auth(String),
    /// Per-chunk failure; the run carries on.
    #[error("transient fetch failure: {0}")]
    Transient(String),
}

impl FetchError {
    /// Whether this failure invalidates the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Auth(_))
    }

    /// Classify a free-form upstream error message.
    ///
    /// The LLM client only hands back boxed errors, so the status code has to
    /// be recovered from the text.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let auth_markers = [
            "unauthorized",
            "forbidden",
            "invalid api key",
            "invalid_api_key",
            "missing api key",
            "incorrect api key",
        ];
        if AUTH_STATUS.is_match(&lower) || auth_markers.iter().any(|m| lower.contains(m)) {
            FetchError::Auth(message)
        } else {
            FetchError::Transient(message)
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid planning input: {0}")]
    PlanningInput(String),

    #[error("run aborted: {0}")]
    Fatal(#[source] FetchError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
