// Rate-Limit Guard: pacing, retry with exponential backoff, and circuit
// breaking for source calls.
//
// One `RateLimiter` per pacing class is shared (via Arc) by every worker of
// a run, so spacing is enforced per source rather than per worker. The
// guard hands its `Pacer` to the client, which waits on it before every
// HTTP request, so a paginated listing is paced page by page. Retries
// only happen for `RateLimited` and `Transient` errors; everything else is
// final on the first attempt. The circuit breaker counts accounts whose
// final outcome was a rate limit and tells the aggregator when to stop
// starting new ones.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use super::traits::{ItemRef, LookbackHint, RawItem, SourceClient};
use crate::config::{PacingSettings, RetrySettings};
use crate::error::SourceError;
use crate::models::{AccountSpec, SourceKind};

struct LimiterState {
    /// Reserved request slots within the current window.
    requests: VecDeque<Instant>,
    /// The most recently reserved slot (for enforcing min_delay).
    last_request: Option<Instant>,
}

/// A sliding-window rate limiter with a minimum spacing between requests.
///
/// Callers reserve a slot under the lock and sleep outside it, so
/// concurrent workers queue up behind each other instead of all waking
/// at once after the same delay.
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    /// Maximum number of requests allowed per window.
    max_requests: u32,
    /// Duration of the sliding window.
    window: Duration,
    /// Minimum delay between consecutive requests.
    min_delay: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// - `max_requests_per_window`: how many requests are allowed in the window
    /// - `window_seconds`: the sliding window duration in seconds
    /// - `min_delay_ms`: minimum milliseconds between consecutive requests
    pub fn new(max_requests_per_window: u32, window_seconds: u64, min_delay_ms: u64) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                requests: VecDeque::new(),
                last_request: None,
            }),
            max_requests: max_requests_per_window.max(1),
            window: Duration::from_secs(window_seconds),
            min_delay: Duration::from_millis(min_delay_ms),
        }
    }

    /// A limiter that only enforces spacing.
    pub fn spacing(min_delay_ms: u64) -> Self {
        Self::new(u32::MAX, 0, min_delay_ms)
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // Pacing state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait until a request may be made.
    pub async fn acquire(&self) {
        loop {
            let action = {
                let now = Instant::now();
                let mut state = self.lock();

                while let Some(&oldest) = state.requests.front() {
                    if now.saturating_duration_since(oldest) >= self.window {
                        state.requests.pop_front();
                    } else {
                        break;
                    }
                }

                if (state.requests.len() as u64) < u64::from(self.max_requests) {
                    let slot = match state.last_request {
                        Some(last) => (last + self.min_delay).max(now),
                        None => now,
                    };
                    state.requests.push_back(slot);
                    state.last_request = Some(slot);
                    Ok(slot)
                } else {
                    let oldest = state.requests.front().copied().unwrap_or(now);
                    Err(oldest + self.window)
                }
            };

            match action {
                Ok(slot) => {
                    tokio::time::sleep_until(slot).await;
                    return;
                }
                Err(window_opens) => {
                    let wait = window_opens.saturating_duration_since(Instant::now());
                    info!(
                        delay_ms = wait.as_millis() as u64,
                        "Rate limit window full, waiting {}ms",
                        wait.as_millis()
                    );
                    tokio::time::sleep_until(window_opens).await;
                }
            }
        }
    }

    /// Number of requests currently counted in the window.
    pub fn in_window(&self) -> usize {
        self.lock().requests.len()
    }
}

/// Backoff schedule for retryable source errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            jitter: settings.jitter,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based): base doubled per retry,
    /// capped at `max_delay`, with +/-25% jitter when enabled. A longer
    /// source-provided retry-after wins, still bounded by `max_delay`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let backoff = if self.jitter {
            // Nanosecond clock noise is plenty to spread concurrent retries.
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos();
            let jitter_factor = 0.75 + (nanos % 500) as f64 / 1000.0;
            Duration::from_secs_f64(backoff.as_secs_f64() * jitter_factor)
        } else {
            backoff
        };

        match retry_after {
            Some(hint) if hint > backoff => hint.min(self.max_delay),
            _ => backoff,
        }
    }
}

/// The limiters a source client waits on before each HTTP request:
/// `requests` for API calls, `media` for transcript downloads.
#[derive(Clone)]
pub struct Pacer {
    requests: Arc<RateLimiter>,
    media: Arc<RateLimiter>,
}

impl Pacer {
    pub fn new(pacing: &PacingSettings) -> Self {
        Self {
            requests: Arc::new(RateLimiter::new(
                pacing.window_max_requests,
                pacing.window_secs,
                pacing.request_spacing_ms,
            )),
            media: Arc::new(RateLimiter::spacing(pacing.media_spacing_ms)),
        }
    }

    /// No spacing at all. For direct client calls outside a run.
    pub fn unpaced() -> Self {
        Self {
            requests: Arc::new(RateLimiter::spacing(0)),
            media: Arc::new(RateLimiter::spacing(0)),
        }
    }

    pub fn requests(&self) -> &RateLimiter {
        &self.requests
    }

    pub fn media(&self) -> &RateLimiter {
        &self.media
    }
}

/// Run `operation`, retrying retryable failures with backoff.
///
/// Pacing is not applied here: the operation's own requests go through
/// the `Pacer`, so every retried request is paced too. The last error is
/// returned once attempts run out.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    label: &str,
    operation: F,
) -> Result<T, SourceError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() || attempt >= policy.max_attempts {
                    return Err(err);
                }

                let retry_after = match &err {
                    SourceError::RateLimited { retry_after, .. } => *retry_after,
                    _ => None,
                };
                let delay = policy.delay_for(attempt, retry_after);

                warn!(
                    call = label,
                    attempt = attempt,
                    max_attempts = policy.max_attempts,
                    backoff_secs = delay.as_secs_f64(),
                    error = %err,
                    "Source call failed, retrying in {:.1}s",
                    delay.as_secs_f64(),
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Trips once enough accounts have ended in a rate limit.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: usize,
    rate_limited: AtomicUsize,
    open: AtomicBool,
}

impl CircuitBreaker {
    /// Threshold is `ceil(fraction * total_accounts)`, at least 1.
    pub fn new(total_accounts: usize, fraction: f64) -> Self {
        let threshold = (fraction * total_accounts as f64).ceil().max(1.0) as usize;
        Self {
            threshold,
            rate_limited: AtomicUsize::new(0),
            open: AtomicBool::new(false),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Count one account whose final outcome was a rate limit. Returns
    /// true if this call tripped the breaker.
    pub fn record_rate_limited(&self) -> bool {
        let count = self.rate_limited.fetch_add(1, Ordering::SeqCst) + 1;
        count >= self.threshold && !self.open.swap(true, Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn rate_limited_count(&self) -> usize {
        self.rate_limited.load(Ordering::SeqCst)
    }
}

/// A source client behind the shared limiters, retry policy, and breaker.
/// Cloning shares all pacing state.
#[derive(Clone)]
pub struct GuardedSource {
    client: Arc<dyn SourceClient>,
    pacer: Pacer,
    policy: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl GuardedSource {
    pub fn new(
        client: Arc<dyn SourceClient>,
        pacing: &PacingSettings,
        retry: &RetrySettings,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            client,
            pacer: Pacer::new(pacing),
            policy: RetryPolicy::from(retry),
            breaker: Arc::new(breaker),
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.client.kind()
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub async fn list_recent(
        &self,
        account: &AccountSpec,
        hint: &LookbackHint,
    ) -> Result<Vec<RawItem>, SourceError> {
        with_retry(&self.policy, "list_recent", || {
            self.client.list_recent(account, hint, &self.pacer)
        })
        .await
    }

    pub async fn fetch_detail(&self, item: &ItemRef) -> Result<RawItem, SourceError> {
        with_retry(&self.policy, "fetch_detail", || {
            self.client.fetch_detail(item, &self.pacer)
        })
        .await
    }

    /// Clients pace transcript downloads with the slower media limiter.
    pub async fn fetch_transcript(&self, item: &ItemRef) -> Result<Option<String>, SourceError> {
        with_retry(&self.policy, "fetch_transcript", || {
            self.client.fetch_transcript(item, &self.pacer)
        })
        .await
    }

    /// Record an account's final failure. Returns true if it tripped the
    /// breaker.
    pub fn record_failure(&self, err: &SourceError) -> bool {
        match err {
            SourceError::RateLimited { .. } => self.breaker.record_rate_limited(),
            _ => false,
        }
    }
}
