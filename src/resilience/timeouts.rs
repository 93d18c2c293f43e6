//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - On expiry the wrapped future is dropped; nothing else is aborted
//! - Timeout errors are distinct and recognizable by the classifier

use std::future::Future;
use std::time::Duration;

use crate::api::error::ApiError;

/// Races operations against a deadline.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutHandler {
    request_timeout: Duration,
}

impl TimeoutHandler {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Await `operation`, giving up after `timeout` (or the default).
    pub async fn with_timeout<T, F>(&self, operation: F, timeout: Option<Duration>) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let after = timeout.unwrap_or(self.request_timeout);
        match tokio::time::timeout(after, operation).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(timeout_ms = after.as_millis() as u64, "Operation timed out");
                Err(ApiError::Timeout { after })
            }
        }
    }
}

impl Default for TimeoutHandler {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}
