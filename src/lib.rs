//! Resilient forum API client.
//!
//! # Architecture Overview
//!
//! ```text
//!   CLI / embedding application
//!        │
//!        ├──▶ votes::VoteController ──┐
//!        │                            ▼
//!        ├──▶ api::ApiClient ──▶ resilience (breaker → retry → timeout) ──▶ HTTP
//!        │                            │
//!        │                            └──▶ resilience::FallbackStore
//!        │
//!        └──▶ notifications::NotificationCenter ◀── live channel (WebSocket)
//!
//!   Cross-cutting: config, observability (tracing + metrics), lifecycle
//! ```

// Core subsystems
pub mod api;
pub mod notifications;
pub mod resilience;
pub mod votes;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use api::{ApiClient, ApiError, ApiResponse, ApiResult, RequestOptions, ResponseSource};
pub use config::ClientConfig;
pub use lifecycle::Shutdown;
pub use notifications::NotificationCenter;
pub use votes::VoteController;
