//! Client error taxonomy.

use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Low-level cause of a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// Host name could not be resolved.
    DnsLookup,
    /// The remote end refused the connection.
    ConnectionRefused,
    /// The connection was dropped mid-exchange.
    ConnectionReset,
    /// Any other transport failure.
    Other,
}

impl NetworkErrorKind {
    /// Conventional short code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            NetworkErrorKind::DnsLookup => "ENOTFOUND",
            NetworkErrorKind::ConnectionRefused => "ECONNREFUSED",
            NetworkErrorKind::ConnectionReset => "ECONNRESET",
            NetworkErrorKind::Other => "ENETWORK",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Standard JSON error body returned by the forum API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Coarse error class used for propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Timeout,
    /// 4xx other than 400, 422 and 429.
    Client,
    /// 5xx.
    Server,
    /// 429.
    RateLimited,
    Parse,
    /// 400/422 responses and locally rejected input.
    Validation,
    Unknown,
}

/// Errors surfaced by the API client.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Connection could not be established or was lost.
    #[error("network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    /// The request did not settle before its deadline.
    #[error("request timeout after {after:?}")]
    Timeout { after: Duration },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} {status_text}")]
    Http {
        status: u16,
        status_text: String,
        retry_after: Option<Duration>,
        body: Option<ErrorBody>,
    },

    /// The response body was not the expected JSON.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Input rejected before it reached the network.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The request could not be built (bad path, bad base URL).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The breaker for this endpoint is open and nothing else is known.
    #[error("circuit open for {key}")]
    CircuitOpen { key: String },

    #[error("{0}")]
    Other(String),
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Build an HTTP error from a status code.
    pub fn http(status: u16, retry_after: Option<Duration>, body: Option<ErrorBody>) -> Self {
        let status_text = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown Status")
            .to_string();
        ApiError::Http {
            status,
            status_text,
            retry_after,
            body,
        }
    }

    /// HTTP status, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-requested wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Http { status, .. } => match *status {
                429 => ErrorKind::RateLimited,
                400 | 422 => ErrorKind::Validation,
                400..=499 => ErrorKind::Client,
                500..=599 => ErrorKind::Server,
                _ => ErrorKind::Unknown,
            },
            ApiError::Parse(_) => ErrorKind::Parse,
            ApiError::Validation(_) | ApiError::InvalidRequest(_) => ErrorKind::Validation,
            ApiError::CircuitOpen { .. } | ApiError::Other(_) => ErrorKind::Unknown,
        }
    }

    /// Translate a transport error from reqwest.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return ApiError::Timeout { after: timeout };
        }
        if err.is_decode() {
            return ApiError::Parse(err.to_string());
        }
        if err.is_builder() {
            return ApiError::InvalidRequest(err.to_string());
        }
        ApiError::Network {
            kind: network_kind(&err),
            message: err.to_string(),
        }
    }
}

/// Walk the source chain looking for a recognizable connectivity failure.
fn network_kind(err: &reqwest::Error) -> NetworkErrorKind {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return NetworkErrorKind::ConnectionRefused,
                std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof => return NetworkErrorKind::ConnectionReset,
                _ => {}
            }
        }
        let text = e.to_string().to_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return NetworkErrorKind::DnsLookup;
        }
        if text.contains("connection refused") {
            return NetworkErrorKind::ConnectionRefused;
        }
        if text.contains("connection reset") || text.contains("connection closed") {
            return NetworkErrorKind::ConnectionReset;
        }
        source = e.source();
    }
    if err.is_connect() {
        NetworkErrorKind::ConnectionRefused
    } else {
        NetworkErrorKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_kinds() {
        assert_eq!(ApiError::http(503, None, None).kind(), ErrorKind::Server);
        assert_eq!(ApiError::http(429, None, None).kind(), ErrorKind::RateLimited);
        assert_eq!(ApiError::http(404, None, None).kind(), ErrorKind::Client);
        assert_eq!(ApiError::http(422, None, None).kind(), ErrorKind::Validation);
        assert_eq!(ApiError::Parse("bad".into()).kind(), ErrorKind::Parse);
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::http(503, None, None);
        assert_eq!(err.to_string(), "HTTP 503 Service Unavailable");

        let err = ApiError::Timeout {
            after: Duration::from_secs(10),
        };
        assert!(err.to_string().to_lowercase().contains("timeout"));

        let err = ApiError::Network {
            kind: NetworkErrorKind::ConnectionRefused,
            message: "refused".into(),
        };
        assert!(err.to_string().contains("ECONNREFUSED"));
    }

    #[test]
    fn test_error_body_roundtrip_shape() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"error":"Invalid input","details":[{"path":"title"}]}"#).unwrap();
        assert_eq!(body.error, "Invalid input");
        assert!(body.details.is_some());

        let bare: ErrorBody = serde_json::from_str(r#"{"error":"Not found"}"#).unwrap();
        assert!(bare.details.is_none());
    }
}
