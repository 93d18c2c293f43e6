//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failure is retryable (classifier + configured statuses)
//! - Execute retries with capped exponential backoff
//! - Honor a server-provided `Retry-After` for the next wait, up to
//!   `max_retry_after`
//!
//! # Design Decisions
//! - Non-retryable errors surface after a single attempt
//! - Exhausted retries surface the last error unchanged
//! - Jitter is opt-in and never pushes a wait past the cap

use std::future::Future;

use crate::api::error::ApiError;
use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::classifier::classify;

/// Whether `error` deserves another attempt under `config`.
///
/// The one retryability rule, shared by retries and fallback eligibility.
/// `retryable_status_codes` adds statuses; it cannot remove the classifier's.
pub fn is_retryable(error: &ApiError, config: &RetryConfig) -> bool {
    classify(error).is_retryable
        || error
            .status()
            .is_some_and(|s| config.retryable_status_codes.contains(&s))
}

/// Wraps an async operation with bounded retries.
#[derive(Debug, Clone)]
pub struct RetryHandler {
    label: String,
}

impl RetryHandler {
    /// `label` names the operation in logs and metrics.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Run `operation` until it succeeds, fails non-retryably, or
    /// `config.max_attempts` attempts have been made.
    pub async fn execute<T, F, Fut>(&self, mut operation: F, config: &RetryConfig) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let max_attempts = config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !is_retryable(&err, config) {
                tracing::debug!(op = %self.label, attempt, error = %err, "Non-retryable failure");
                return Err(err);
            }
            if attempt >= max_attempts {
                tracing::warn!(op = %self.label, attempts = attempt, error = %err, "Retries exhausted");
                return Err(err);
            }

            let delay = match err.retry_after() {
                Some(wait) if wait > config.max_retry_after() => {
                    tracing::warn!(
                        op = %self.label,
                        requested = ?wait,
                        cap = ?config.max_retry_after(),
                        "Retry-After exceeds cap, clamping"
                    );
                    config.max_retry_after()
                }
                Some(wait) => wait,
                None => calculate_backoff(
                    attempt,
                    config.base_delay(),
                    config.max_delay(),
                    config.backoff_multiplier,
                    config.jitter_ratio,
                ),
            };
            tracing::info!(op = %self.label, attempt, delay = ?delay, error = %err, "Retrying");
            metrics::record_retry(&self.label);
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryHandler {
    fn default() -> Self {
        Self::new("operation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;

    fn config() -> RetryConfig {
        RetryConfig {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            ..RetryConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_retryable_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = RetryHandler::default()
            .execute(
                move || async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(ApiError::http(503, None, None))
                    } else {
                        Ok("ok")
                    }
                },
                &config(),
            )
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_single_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let err = RetryHandler::default()
            .execute(
                move || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::http(400, None, None))
                },
                &config(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();
        let err = RetryHandler::default()
            .execute(
                move || async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(ApiError::http(500 + n as u16, None, None))
                },
                &config(),
            )
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.status(), Some(502));
        // 100ms + 200ms of backoff
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_backoff() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();
        RetryHandler::default()
            .execute(
                move || async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiError::http(429, Some(Duration::from_secs(7)), None))
                    } else {
                        Ok(())
                    }
                },
                &config(),
            )
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_is_capped() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let config = RetryConfig {
            max_retry_after_ms: 2_000,
            ..config()
        };
        let start = Instant::now();
        RetryHandler::default()
            .execute(
                move || async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(ApiError::http(429, Some(Duration::from_secs(86_400)), None))
                    } else {
                        Ok(())
                    }
                },
                &config,
            )
            .await
            .unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_configured_statuses() {
        let config = config();
        assert!(is_retryable(&ApiError::http(408, None, None), &config));
        assert!(!is_retryable(&ApiError::http(404, None, None), &config));

        let strict = RetryConfig {
            retryable_status_codes: Vec::new(),
            ..config
        };
        assert!(!is_retryable(&ApiError::http(408, None, None), &strict));
        assert!(is_retryable(&ApiError::http(503, None, None), &strict));
    }
}
