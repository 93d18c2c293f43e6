//! Error classification.
//!
//! # Responsibilities
//! - Label a failure as network, timeout, or neither
//! - Decide whether the failure is worth another attempt
//!
//! # Design Decisions
//! - Pure function of the error, no side effects
//! - Connection errors and timeouts always retryable
//! - 5xx and 429 retryable, every other 4xx is not
//! - Unknown shapes fail closed (never retried)

use crate::api::error::ApiError;

/// Classification of a failed request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_network_error: bool,
    pub is_timeout_error: bool,
    pub is_retryable: bool,
}

/// Classify an error for retry and breaker decisions.
pub fn classify(error: &ApiError) -> Classification {
    match error {
        ApiError::Network { message, .. } if mentions_timeout(message) => timeout(),
        ApiError::Network { .. } => Classification {
            is_network_error: true,
            is_timeout_error: false,
            is_retryable: true,
        },
        ApiError::Timeout { .. } => timeout(),
        ApiError::Http { status, .. } => Classification {
            is_network_error: false,
            is_timeout_error: false,
            is_retryable: *status == 429 || (500..=599).contains(status),
        },
        ApiError::Other(message) if mentions_timeout(message) => timeout(),
        _ => Classification::default(),
    }
}

fn timeout() -> Classification {
    Classification {
        is_network_error: false,
        is_timeout_error: true,
        is_retryable: true,
    }
}

fn mentions_timeout(message: &str) -> bool {
    message.to_ascii_lowercase().contains("timeout")
}
