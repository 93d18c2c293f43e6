//! Resilient forum API client.
//!
//! # Responsibilities
//! - Build requests against the configured base URL
//! - Enforce per-attempt deadlines, retries, and per-endpoint circuit breaking
//! - Convert non-2xx responses into `ApiError::Http`
//! - Record and serve last-known-good bodies through the fallback store
//!
//! # Data Flow
//! ```text
//! request()
//!     → breaker open? → fallback or last error
//!     → RetryHandler
//!         → breaker check → TimeoutHandler(send) → record outcome on breaker
//!     → success: store fallback, decode
//!     → exhausted: fallback or last error
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::api::error::{ApiError, ApiResult, ErrorBody};
use crate::api::types::{
    CommentResponse, Comment, NewComment, NewPost, Page, PageQuery, Post, PostResponse,
    SearchResults, VoteRequest, VoteResponse,
};
use crate::config::{ClientConfig, RetryConfig};
use crate::observability::metrics;
use crate::resilience::retries::is_retryable;
use crate::resilience::{CircuitBreakerRegistry, FallbackStore, RetryHandler, TimeoutHandler};

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fresh from the server.
    Network,
    /// Served from the fallback store after the live request failed.
    Fallback,
}

/// A decoded body tagged with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub data: T,
    pub source: ResponseSource,
}

impl<T> ApiResponse<T> {
    pub fn is_fallback(&self) -> bool {
        self.source == ResponseSource::Fallback
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

/// Per-request knobs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Store successes under, and serve failures from, this fallback key.
    pub fallback_key: Option<String>,
    /// Breaker key; defaults to `"<METHOD> <path>"`.
    pub circuit_key: Option<String>,
    /// Overrides the client's retry configuration.
    pub retry: Option<RetryConfig>,
    /// Overrides the client's per-attempt deadline.
    pub timeout: Option<Duration>,
    /// Query string pairs.
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_fallback_key(mut self, key: impl Into<String>) -> Self {
        self.fallback_key = Some(key.into());
        self
    }

    pub fn with_circuit_key(mut self, key: impl Into<String>) -> Self {
        self.circuit_key = Some(key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_query<K: Into<String>>(mut self, pairs: impl IntoIterator<Item = (K, String)>) -> Self {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }
}

/// JSON-over-HTTP client with timeouts, retries, circuit breaking and fallback.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    retry: RetryConfig,
    timeouts: TimeoutHandler,
    breakers: Arc<CircuitBreakerRegistry>,
    fallback: FallbackStore,
}

impl ApiClient {
    /// Create a client with its own breaker registry and fallback store.
    pub fn new(config: &ClientConfig) -> ApiResult<Self> {
        let breakers = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone()));
        let fallback = FallbackStore::with_max_age(config.fallback.max_age());
        Self::with_stores(config, breakers, fallback)
    }

    /// Create a client sharing the given breaker registry and fallback store.
    pub fn with_stores(
        config: &ClientConfig,
        breakers: Arc<CircuitBreakerRegistry>,
        fallback: FallbackStore,
    ) -> ApiResult<Self> {
        let mut base_url = Url::parse(&config.api.base_url).map_err(|e| {
            ApiError::InvalidRequest(format!("invalid base URL '{}': {}", config.api.base_url, e))
        })?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .user_agent(config.api.user_agent.as_str())
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        tracing::debug!(base_url = %base_url, "API client created");

        Ok(Self {
            http,
            base_url,
            retry: config.retries.clone(),
            timeouts: TimeoutHandler::new(config.timeouts.request()),
            breakers,
            fallback,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }

    /// Resolve `path` (with optional query) against the base URL.
    pub fn url(&self, path: &str, query: &[(String, String)]) -> ApiResult<Url> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::InvalidRequest(format!("invalid path '{}': {}", path, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Issue a request through the full resilience stack.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> ApiResult<ApiResponse<T>> {
        let start = Instant::now();
        let url = self.url(path, &options.query)?;
        let key = options
            .circuit_key
            .clone()
            .unwrap_or_else(|| format!("{} {}", method, url.path()));

        if !self.breakers.can_execute(&key) {
            tracing::debug!(key = %key, "Circuit open, skipping network");
            if let Some(response) = self.serve_fallback(&options)? {
                metrics::record_request(&key, "fallback", start);
                return Ok(response);
            }
            metrics::record_request(&key, "circuit_open", start);
            return Err(self.open_circuit_error(&key));
        }

        let retry = options.retry.as_ref().unwrap_or(&self.retry);
        let result = RetryHandler::new(key.as_str())
            .execute(
                || self.attempt(&method, &url, body.as_ref(), &key, options.timeout),
                retry,
            )
            .await;

        match result {
            Ok(value) => {
                if let Some(fallback_key) = &options.fallback_key {
                    self.fallback.set_fallback_data(fallback_key.as_str(), value.clone());
                }
                metrics::record_request(&key, "ok", start);
                let data = serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))?;
                Ok(ApiResponse {
                    data,
                    source: ResponseSource::Network,
                })
            }
            Err(err) => {
                let err = match err {
                    ApiError::CircuitOpen { .. } => self.open_circuit_error(&key),
                    other => other,
                };
                if is_retryable(&err, retry) {
                    if let Some(response) = self.serve_fallback(&options)? {
                        tracing::warn!(key = %key, error = %err, "Request failed, serving fallback data");
                        metrics::record_request(&key, "fallback", start);
                        return Ok(response);
                    }
                }
                metrics::record_request(&key, "error", start);
                Err(err)
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, options: RequestOptions) -> ApiResult<ApiResponse<T>> {
        self.request(Method::GET, path, None, options).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: RequestOptions,
    ) -> ApiResult<ApiResponse<T>> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.request(Method::POST, path, Some(body), options).await
    }

    // --- Forum endpoints ---

    /// `POST /api/votes`.
    pub async fn submit_vote(&self, request: &VoteRequest) -> ApiResult<VoteResponse> {
        request.validate()?;
        let response = self
            .post("/api/votes", request, RequestOptions::default())
            .await?;
        Ok(response.into_inner())
    }

    /// `GET /api/posts`, falling back to the last page seen for the same query.
    pub async fn list_posts(&self, query: &PageQuery) -> ApiResult<ApiResponse<Page<Post>>> {
        let pairs = query.to_pairs();
        let options = RequestOptions::default()
            .with_fallback_key(fallback_key("posts", &pairs))
            .with_query(pairs);
        self.get("/api/posts", options).await
    }

    /// `GET /api/comments?postId=...`.
    pub async fn list_comments(&self, post_id: &str, query: &PageQuery) -> ApiResult<ApiResponse<Page<Comment>>> {
        if post_id.trim().is_empty() {
            return Err(ApiError::Validation("postId must not be empty".into()));
        }
        let mut pairs = vec![("postId", post_id.to_string())];
        pairs.extend(query.to_pairs());
        let options = RequestOptions::default()
            .with_fallback_key(fallback_key("comments", &pairs))
            .with_query(pairs);
        self.get("/api/comments", options).await
    }

    /// `GET /api/search?q=...`.
    pub async fn search(&self, q: &str, query: &PageQuery) -> ApiResult<ApiResponse<SearchResults>> {
        if q.trim().is_empty() {
            return Err(ApiError::Validation("search query must not be empty".into()));
        }
        let mut pairs = vec![("q", q.to_string())];
        pairs.extend(query.to_pairs());
        let options = RequestOptions::default()
            .with_fallback_key(fallback_key("search", &pairs))
            .with_query(pairs);
        self.get("/api/search", options).await
    }

    /// `POST /api/posts`.
    pub async fn create_post(&self, post: &NewPost) -> ApiResult<Post> {
        post.validate()?;
        let response: ApiResponse<PostResponse> =
            self.post("/api/posts", post, RequestOptions::default()).await?;
        Ok(response.into_inner().post)
    }

    /// `POST /api/comments`.
    pub async fn create_comment(&self, comment: &NewComment) -> ApiResult<Comment> {
        comment.validate()?;
        let response: ApiResponse<CommentResponse> =
            self.post("/api/comments", comment, RequestOptions::default()).await?;
        Ok(response.into_inner().comment)
    }

    // --- Internals ---

    async fn attempt(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&Value>,
        key: &str,
        timeout: Option<Duration>,
    ) -> ApiResult<Value> {
        // The breaker may have opened during earlier attempts.
        if !self.breakers.can_execute(key) {
            return Err(ApiError::CircuitOpen { key: key.to_string() });
        }

        let deadline = timeout.unwrap_or(self.timeouts.request_timeout());
        let result = self
            .timeouts
            .with_timeout(self.send(method, url, body, deadline), Some(deadline))
            .await;

        // Every rejected attempt counts; retryability only drives retry and fallback.
        match &result {
            Ok(_) => self.breakers.record_success(key),
            Err(e) => self.breakers.record_failure(key, e),
        }
        result
    }

    async fn send(&self, method: &Method, url: &Url, body: Option<&Value>, deadline: Duration) -> ApiResult<Value> {
        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(e, deadline))?;
        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            let body = serde_json::from_str::<ErrorBody>(&text).ok();
            return Err(ApiError::http(status.as_u16(), retry_after, body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_reqwest(e, deadline))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Parse(e.to_string()))
    }

    fn serve_fallback<T: DeserializeOwned>(&self, options: &RequestOptions) -> ApiResult<Option<ApiResponse<T>>> {
        let Some(key) = options.fallback_key.as_deref() else {
            return Ok(None);
        };
        let Some(value) = self.fallback.get_fallback_data(key) else {
            return Ok(None);
        };
        metrics::record_fallback_served(key);
        let data = serde_json::from_value(value).map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(Some(ApiResponse {
            data,
            source: ResponseSource::Fallback,
        }))
    }

    fn open_circuit_error(&self, key: &str) -> ApiError {
        self.breakers
            .last_error(key)
            .unwrap_or_else(|| ApiError::CircuitOpen { key: key.to_string() })
    }
}

fn fallback_key(prefix: &str, pairs: &[(&str, String)]) -> String {
    let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    format!("{}?{}", prefix, query.join("&"))
}

/// Parse a `Retry-After` value: delta-seconds or an HTTP date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    let wait = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
    Some(wait)
}
