// Error taxonomy for the aggregation pipeline.
//
// Per-account (`SourceError`) and per-item (`TextServiceError`,
// `NormalizeError`) errors are converted into stats and markers by the
// aggregator. Only `RunError` ever reaches the caller.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::models::FailureReason;

/// Failure talking to a content source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// The account doesn't exist or can't be resolved by name.
    #[error("not found: {0}")]
    NotFound(String),

    /// The account is private, blocked, or our credentials lack permission.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Explicit denial signal from the source (HTTP 429, quota exhausted).
    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    /// Network error, timeout, or 5xx.
    #[error("transient failure: {0}")]
    Transient(String),
}

impl SourceError {
    pub fn rate_limited(message: impl Into<String>) -> Self {
        SourceError::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Only rate limits and transient failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SourceError::RateLimited { .. } | SourceError::Transient(_)
        )
    }

    pub fn reason(&self) -> FailureReason {
        match self {
            SourceError::NotFound(_) => FailureReason::AccountNotFound,
            SourceError::AccessDenied(_) => FailureReason::AccountAccessDenied,
            SourceError::RateLimited { .. } => FailureReason::AccountRateLimited,
            SourceError::Transient(_) => FailureReason::AccountTransientFailure,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) if status.as_u16() == 429 => SourceError::rate_limited(err.to_string()),
            Some(status) if status.as_u16() == 404 => SourceError::NotFound(err.to_string()),
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                SourceError::AccessDenied(err.to_string())
            }
            _ => SourceError::Transient(err.to_string()),
        }
    }
}

/// Failure from the summarization backend. Every variant degrades the
/// episode's text to "unknown"; none of them removes the episode.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TextServiceError {
    #[error("text service unavailable: {0}")]
    Unavailable(String),

    #[error("text service does not accept {0}")]
    Unsupported(&'static str),
}

/// Why a raw record could not become a Content Item.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("item {source_id} has no parseable publish date ({raw:?})")]
    MissingPublishDate {
        source_id: String,
        raw: Option<String>,
    },

    #[error("carousel {source_id} has no slide count")]
    MissingSlideCount { source_id: String },

    #[error("item {source_id} has unsupported media type {media_type}")]
    UnsupportedMediaType {
        source_id: String,
        media_type: String,
    },
}

/// Problems with the analysis config file. Fatal; raised before any fetch.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Hard failures of a whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration invalid: {0}")]
    ConfigInvalid(#[from] ConfigError),

    #[error("failed to write results to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
