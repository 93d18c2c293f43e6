//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to the API:
//!     → circuit_breaker.rs (fail fast while the endpoint is open)
//!     → retries.rs (classifier.rs decides, backoff.rs waits)
//!         → timeouts.rs (deadline per attempt)
//!     → fallback.rs (serve last-known-good when nothing else works)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every network call has a deadline
//! - Only network, timeout, 5xx and 429 failures are retried
//! - Circuit breaker prevents hammering a failing endpoint
//! - Shared state (breakers, fallback) is injected, never global

pub mod backoff;
pub mod circuit_breaker;
pub mod classifier;
pub mod fallback;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerRegistry, CircuitBreakerState, CircuitState};
pub use classifier::{classify, Classification};
pub use fallback::FallbackStore;
pub use retries::RetryHandler;
pub use timeouts::TimeoutHandler;
