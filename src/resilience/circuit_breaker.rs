//! Circuit breaker for endpoint protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: endpoint assumed down, requests fail fast
//! - Half-Open: testing if endpoint recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: lazily, on the first check after the recovery timeout
//! Half-Open → Closed: next success
//! Half-Open → Open: next failure (the count never dropped below threshold)
//! ```
//!
//! # Design Decisions
//! - Per-key breaker (keys are caller-chosen, usually one per endpoint)
//! - Fail fast in Open state, re-raising the failure that opened it
//! - No persistence; state lives as long as the registry

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::api::error::ApiError;
use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<Instant>,
}

/// A single breaker. Fields change only through the transition methods.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    last_error: Option<ApiError>,
    failure_threshold: u32,
    recovery_timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self::with_settings(config.failure_threshold, config.recovery_timeout())
    }

    pub fn with_settings(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            last_error: None,
            failure_threshold: failure_threshold.max(1),
            recovery_timeout,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }

    pub fn snapshot(&self) -> CircuitBreakerState {
        CircuitBreakerState {
            state: self.state,
            failure_count: self.failure_count,
            last_failure_time: self.last_failure_time,
        }
    }

    /// The failure most recently recorded, if any.
    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    /// Whether a request may go out. Moves Open → Half-Open once the
    /// recovery timeout has elapsed since the last failure.
    pub fn can_execute(&mut self) -> bool {
        match self.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = self
                    .last_failure_time
                    .map_or(true, |at| at.elapsed() >= self.recovery_timeout);
                if recovered {
                    self.state = CircuitState::HalfOpen;
                }
                recovered
            }
        }
    }

    pub fn on_success(&mut self) {
        self.failure_count = 0;
        if self.state == CircuitState::HalfOpen {
            self.state = CircuitState::Closed;
        }
    }

    pub fn on_failure(&mut self, error: Option<ApiError>) {
        self.failure_count = self.failure_count.saturating_add(1);
        self.last_failure_time = Some(Instant::now());
        if error.is_some() {
            self.last_error = error;
        }
        if self.failure_count >= self.failure_threshold {
            self.state = CircuitState::Open;
        }
    }
}

/// Breakers keyed by endpoint, created on first use.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, CircuitBreaker>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.breakers.contains_key(key)
    }

    /// True when no breaker exists for `key` yet.
    pub fn can_execute(&self, key: &str) -> bool {
        let Some(mut breaker) = self.breakers.get_mut(key) else {
            return true;
        };
        let before = breaker.state();
        let allowed = breaker.can_execute();
        log_transition(key, before, breaker.state());
        allowed
    }

    pub fn record_success(&self, key: &str) {
        let mut breaker = self
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| CircuitBreaker::new(&self.config));
        let before = breaker.state();
        breaker.on_success();
        log_transition(key, before, breaker.state());
    }

    pub fn record_failure(&self, key: &str, error: &ApiError) {
        let mut breaker = self
            .breakers
            .entry(key.to_string())
            .or_insert_with(|| CircuitBreaker::new(&self.config));
        let before = breaker.state();
        breaker.on_failure(Some(error.clone()));
        log_transition(key, before, breaker.state());
    }

    pub fn last_error(&self, key: &str) -> Option<ApiError> {
        self.breakers.get(key).and_then(|b| b.last_error().cloned())
    }

    pub fn snapshot(&self, key: &str) -> Option<CircuitBreakerState> {
        self.breakers.get(key).map(|b| b.snapshot())
    }

    /// Forget a breaker entirely.
    pub fn reset(&self, key: &str) {
        if self.breakers.remove(key).is_some() {
            metrics::record_circuit_state(key, CircuitState::Closed.gauge_value());
        }
    }
}

fn log_transition(key: &str, before: CircuitState, after: CircuitState) {
    if before == after {
        return;
    }
    match after {
        CircuitState::Open => tracing::warn!(key = %key, from = ?before, "Circuit opened"),
        CircuitState::HalfOpen => tracing::info!(key = %key, "Circuit half-open, probing"),
        CircuitState::Closed => tracing::info!(key = %key, "Circuit closed"),
    }
    metrics::record_circuit_state(key, after.gauge_value());
}
