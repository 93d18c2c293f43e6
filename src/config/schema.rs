//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the forum client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    /// API endpoint settings.
    pub api: ApiConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Circuit breaker configuration.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Fallback cache configuration.
    pub fallback: FallbackConfig,

    /// Vote submission behavior.
    pub votes: VoteConfig,

    /// Notification center settings.
    pub notifications: NotificationConfig,

    /// Live notification channel.
    pub live_channel: LiveChannelConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// API endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto.
    pub base_url: String,

    /// User-Agent header sent with each request.
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            user_agent: concat!("forum-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-attempt request deadline in milliseconds.
    pub request_ms: u64,
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_ms: 10_000 }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,

    /// Statuses retried in addition to 5xx and 429. The list can only widen
    /// retries; network errors, timeouts, 5xx and 429 are always retried.
    pub retryable_status_codes: Vec<u16>,

    /// Longest wait honored from a server `Retry-After`, in milliseconds.
    pub max_retry_after_ms: u64,

    /// Fraction of the delay added as random jitter (0 disables).
    pub jitter_ratio: f64,
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_millis(self.max_retry_after_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
            retryable_status_codes: vec![408, 429, 500, 502, 503, 504],
            max_retry_after_ms: 60_000,
            jitter_ratio: 0.0,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time since the last failure before a trial request is allowed, in milliseconds.
    pub recovery_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 60_000,
        }
    }
}

/// Fallback cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FallbackConfig {
    /// Maximum age of a fallback entry in seconds. `None` keeps entries
    /// until they are overwritten.
    pub max_age_secs: Option<u64>,
}

impl FallbackConfig {
    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_secs.map(Duration::from_secs)
    }
}

/// Vote submission configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VoteConfig {
    /// Allow only one in-flight vote request per target.
    pub serialize_submissions: bool,
}

/// Notification center configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Maximum retained notifications (oldest evicted first).
    pub max_notifications: usize,

    /// Delay before a non-urgent notification is marked read, in milliseconds.
    pub auto_read_delay_ms: u64,

    /// Raise desktop alerts for new notifications.
    pub desktop_alerts: bool,
}

impl NotificationConfig {
    pub fn auto_read_delay(&self) -> Duration {
        Duration::from_millis(self.auto_read_delay_ms)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_notifications: 50,
            auto_read_delay_ms: 5000,
            desktop_alerts: true,
        }
    }
}

/// Live notification channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LiveChannelConfig {
    /// WebSocket URL; the channel is disabled when unset.
    pub url: Option<String>,

    /// First reconnect delay in milliseconds.
    pub reconnect_base_ms: u64,

    /// Ceiling for reconnect delays in milliseconds.
    pub reconnect_max_ms: u64,

    /// Consecutive failed connections before giving up.
    pub max_reconnect_attempts: u32,
}

impl LiveChannelConfig {
    pub fn reconnect_base(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}

impl Default for LiveChannelConfig {
    fn default() -> Self {
        Self {
            url: None,
            reconnect_base_ms: 5000,
            reconnect_max_ms: 60_000,
            max_reconnect_attempts: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.timeouts.request(), Duration::from_secs(10));
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout(), Duration::from_secs(60));
        assert_eq!(config.notifications.auto_read_delay(), Duration::from_secs(5));
        assert!(config.fallback.max_age().is_none());
        assert!(config.live_channel.url.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://forum.example"

            [retries]
            max_attempts = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "https://forum.example");
        assert_eq!(config.retries.max_attempts, 5);
        assert_eq!(config.retries.base_delay_ms, 1000);
        assert_eq!(config.notifications.max_notifications, 50);
    }
}
