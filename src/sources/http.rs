// JSON-over-HTTP helper shared by the platform clients.
//
// A thin reqwest wrapper with a generic GET helper. Each request first
// waits on the limiter it is given. Every failure comes back
// as a `SourceError` so the rate-limit guard can tell retryable failures
// (429, 5xx, timeouts) from final ones (404, 403).

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::rate_limit::RateLimiter;
use crate::error::SourceError;

/// Turns a non-success status and its body into a `SourceError`.
/// Platforms with structured error bodies supply their own.
pub type Classifier = fn(StatusCode, &str) -> SourceError;

/// Request timeout for all source calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (trailing slashes are ignored).
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("rivalscan/0.1 (competitor-content-analysis)")
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base_url}{path}` and deserialize the JSON response.
    ///
    /// `params` are query string pairs; they may carry credentials, so only
    /// the path is logged.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        limiter: &RateLimiter,
        path: &str,
        params: &[(&str, &str)],
        classify: Classifier,
    ) -> Result<T, SourceError> {
        let response = self.send(limiter, path, params, classify).await?;
        response.json::<T>().await.map_err(|e| {
            SourceError::Transient(format!("failed to decode response from {path}: {e}"))
        })
    }

    /// GET `{base_url}{path}` and return the body as text.
    pub async fn get_text(
        &self,
        limiter: &RateLimiter,
        path: &str,
        params: &[(&str, &str)],
        classify: Classifier,
    ) -> Result<String, SourceError> {
        let response = self.send(limiter, path, params, classify).await?;
        response
            .text()
            .await
            .map_err(|e| SourceError::Transient(format!("failed to read body from {path}: {e}")))
    }

    async fn send(
        &self,
        limiter: &RateLimiter,
        path: &str,
        params: &[(&str, &str)],
        classify: Classifier,
    ) -> Result<Response, SourceError> {
        limiter.acquire().await;
        let url = format!("{}{}", self.base_url, path);
        debug!(path = path, "Source GET request");

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| SourceError::Transient(format!("request to {path} failed: {e}")))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let retry_after = parse_retry_after(&response);
        let body = response.text().await.unwrap_or_default();

        Err(match classify(status, &body) {
            SourceError::RateLimited {
                message,
                retry_after: None,
            } => SourceError::RateLimited {
                message,
                retry_after,
            },
            other => other,
        })
    }
}

/// Default status mapping for sources without structured error bodies.
pub fn classify_status(status: StatusCode, body: &str) -> SourceError {
    let message = format!("HTTP {status}: {}", snippet(body));
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::rate_limited(message),
        StatusCode::NOT_FOUND | StatusCode::GONE => SourceError::NotFound(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::AccessDenied(message),
        _ => SourceError::Transient(message),
    }
}

/// First 200 characters of a response body, for error messages.
pub fn snippet(body: &str) -> String {
    crate::output::truncate_chars(body.trim(), 200)
}

fn parse_retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_maps_retryable_and_final_codes() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            SourceError::RateLimited { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, ""),
            SourceError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            SourceError::AccessDenied(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            SourceError::Transient(_)
        ));
    }

    #[test]
    fn test_snippet_truncates_long_bodies() {
        let body = "x".repeat(500);
        assert_eq!(snippet(&body).chars().count(), 203);
    }
}
