//! # Resilient Client
//!
//! Every network call in the admin goes through [`ResilientClient::request`], which applies one
//! retry policy and one error shape:
//!
//! | Outcome | Result | Retried |
//! |---------|--------|---------|
//! | 2xx JSON | [`ApiResponse::Json`] | - |
//! | 204 | [`ApiResponse::NoContent`] | - |
//! | 2xx, other content | [`ApiResponse::Raw`] | - |
//! | 4xx | [`HttpError::Rejected`] | never |
//! | 5xx | [`HttpError::Transient`] | up to `max_attempts` |
//! | no response | [`HttpError::Transient`] with no status | up to `max_attempts` |
//!
//! Error messages come from the `error` or `message` field of a JSON error body, falling back
//! to the status line (`HTTP 503: Service Unavailable`).
//!
//! The wait before attempt `n + 1` is `base_delay × n`. Linear, so the worst case for the
//! default policy is 1 s + 2 s of waiting.
//!
//! The client never sees endpoint paths as anything but opaque URLs; the wire itself is a
//! [`Transport`] ([`HttpTransport`] in production, [`MockTransport`](crate::mock::MockTransport)
//! in tests).

pub mod transport;

pub use transport::HttpTransport;

use crate::error::{HttpError, NetworkError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, url).with_body(body)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::Delete, url)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A response as it came off the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("application/json"))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A successful response, shaped by content.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Json(Value),
    NoContent,
    /// Anything that is not JSON (a CSV download, say), untouched.
    Raw(HttpResponse),
}

impl ApiResponse {
    pub fn json(&self) -> Option<&Value> {
        match self {
            ApiResponse::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Deserialize a JSON response into `T`.
    pub fn parse<T: DeserializeOwned>(self) -> Result<T, HttpError> {
        match self {
            ApiResponse::Json(value) => {
                serde_json::from_value(value).map_err(|e| HttpError::Decode(e.to_string()))
            }
            ApiResponse::NoContent => Err(HttpError::Decode("empty response".to_string())),
            ApiResponse::Raw(response) => Err(HttpError::Decode(format!(
                "expected JSON, got {}",
                response.content_type.as_deref().unwrap_or("no content type")
            ))),
        }
    }
}

/// Sends one request and returns whatever came back.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// One attempt, no waiting.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Wait after failed attempt number `attempt` (1-based). Saturates at [`Duration::MAX`].
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// Retrying HTTP client. Clones share the transport.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_policy(transport, RetryPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub async fn request(&self, request: HttpRequest) -> Result<ApiResponse, HttpError> {
        self.request_with(request, self.policy).await
    }

    /// Like [`request`](Self::request) with a per-call policy.
    #[instrument(skip(self, request, policy), fields(method = %request.method, url = %request.url))]
    pub async fn request_with(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<ApiResponse, HttpError> {
        debug!(body = ?request.body, "Sending request");
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = match self.transport.send(&request).await {
                Ok(response) => classify(response),
                Err(e) => Err(HttpError::Transient {
                    status: None,
                    message: e.0,
                }),
            };

            match outcome {
                Ok(response) => {
                    info!(attempt, "Request ok");
                    return Ok(response);
                }
                Err(e) if !e.is_retryable() => {
                    warn!(status = ?e.status(), error = %e, "Request rejected");
                    return Err(e);
                }
                Err(e) if attempt >= max_attempts => {
                    error!(attempts = attempt, error = %e, "Request failed, giving up");
                    return Err(e);
                }
                Err(e) => {
                    let delay = policy.delay_after(attempt);
                    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                    warn!(attempt, delay_ms, error = %e, "Request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse, HttpError> {
        self.request(HttpRequest::get(url)).await
    }

    pub async fn post(&self, url: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(HttpRequest::post(url, body)).await
    }

    pub async fn delete(&self, url: &str, body: Option<Value>) -> Result<ApiResponse, HttpError> {
        let mut request = HttpRequest::delete(url);
        request.body = body;
        self.request(request).await
    }

    /// GET and deserialize.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, HttpError> {
        self.get(url).await?.parse()
    }
}

fn classify(response: HttpResponse) -> Result<ApiResponse, HttpError> {
    if !response.is_success() {
        let message = error_message(&response);
        return Err(if response.status >= 500 {
            HttpError::Transient {
                status: Some(response.status),
                message,
            }
        } else {
            HttpError::Rejected {
                status: response.status,
                message,
            }
        });
    }

    if response.status == 204 {
        return Ok(ApiResponse::NoContent);
    }
    if response.is_json() {
        return serde_json::from_slice(&response.body)
            .map(ApiResponse::Json)
            .map_err(|e| HttpError::Decode(e.to_string()));
    }
    Ok(ApiResponse::Raw(response))
}

fn error_message(response: &HttpResponse) -> String {
    serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| {
            ["error", "message"]
                .iter()
                .find_map(|field| body.get(field)?.as_str().map(str::to_string))
        })
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| format!("HTTP {}: {}", response.status, response.status_text))
}
