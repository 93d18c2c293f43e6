//! Forum API access.
//!
//! # Data Flow
//! ```text
//! caller (CLI, VoteController)
//!     → client.rs (ApiClient: URL building, resilience stack, decoding)
//!     → types.rs (wire payloads)
//!     → error.rs (ApiError taxonomy shared with resilience/)
//! ```

pub mod client;
pub mod error;
pub mod types;

pub use client::{ApiClient, ApiResponse, RequestOptions, ResponseSource};
pub use error::{ApiError, ApiResult, ErrorBody, ErrorKind, NetworkErrorKind};
pub use types::{TargetType, VoteRequest, VoteType};
