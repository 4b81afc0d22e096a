//! # Mock Transport & Testing Guide
//!
//! [`MockTransport`] implements [`Transport`] entirely in memory. Queue the responses a test
//! needs, hand the mock to a [`ResilientClient`](crate::http::ResilientClient), then check
//! what was sent.
//!
//! ## Testing Strategies
//!
//! | Layer | Use |
//! |-------|-----|
//! | Retry policy | `MockTransport` + `#[tokio::test(start_paused = true)]` |
//! | Overlays | [`HeadlessDocument`](crate::lifecycle::HeadlessDocument) + [`HeadlessSurface`](crate::lifecycle::HeadlessSurface) |
//! | Store | [`MemoryStorage`](crate::store::MemoryStorage), or `FileStorage` in a `tempfile` dir |
//!
//! ## Example
//!
//! ```rust
//! use admin_runtime::http::{Method, ResilientClient, RetryPolicy};
//! use admin_runtime::mock::MockTransport;
//! use serde_json::json;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mock = MockTransport::new();
//!     mock.expect(Method::Get, "/api/products/statistics")
//!         .return_status(503, json!({"error": "busy"}));
//!     mock.expect(Method::Get, "/api/products/statistics")
//!         .return_json(json!({"total_products": 4}));
//!
//!     let client = ResilientClient::with_policy(
//!         Arc::new(mock.clone()),
//!         RetryPolicy::new(3, Duration::from_millis(1)),
//!     );
//!     let stats = client.get("/api/products/statistics").await.unwrap();
//!     assert_eq!(stats.json().unwrap()["total_products"], 4);
//!
//!     assert_eq!(mock.call_count(), 2);
//!     mock.verify(); // every expectation was consumed
//! }
//! ```
//!
//! Requests that do not match the next expectation panic, so a test fails at the call that
//! went wrong rather than at `verify()`.

use crate::error::NetworkError;
use crate::http::{HttpRequest, HttpResponse, Method, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

enum Reply {
    Response(HttpResponse),
    NetworkError(String),
}

struct Expectation {
    method: Method,
    url: String,
    delay: Duration,
    reply: Reply,
}

/// A request the mock received, with the (virtual) time it arrived.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub at: Instant,
}

/// In-memory [`Transport`] with an expectation queue. Clones share the queue and the call log.
#[derive(Clone, Default)]
pub struct MockTransport {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the next request to be `method url`.
    pub fn expect(&self, method: Method, url: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            method,
            url: url.into(),
            delay: Duration::ZERO,
            expectations: self.expectations.clone(),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Gaps between consecutive calls.
    pub fn intervals(&self) -> Vec<Duration> {
        let calls = self.calls.lock().unwrap();
        calls.windows(2).map(|w| w[1].at - w[0].at).collect()
    }

    pub fn remaining(&self) -> usize {
        self.expectations.lock().unwrap().len()
    }

    /// Panics unless every expectation was consumed.
    pub fn verify(&self) {
        let remaining = self.remaining();
        if remaining != 0 {
            panic!("Not all expectations were met. {} remaining", remaining);
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, NetworkError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            url: request.url.clone(),
            body: request.body.clone(),
            at: Instant::now(),
        });

        let expectation = self.expectations.lock().unwrap().pop_front();
        let expectation = match expectation {
            Some(e) if e.method == request.method && e.url == request.url => e,
            Some(e) => panic!(
                "Unexpected request {} {} (expected {} {})",
                request.method, request.url, e.method, e.url
            ),
            None => panic!("Unexpected request {} {}", request.method, request.url),
        };

        if !expectation.delay.is_zero() {
            tokio::time::sleep(expectation.delay).await;
        }
        match expectation.reply {
            Reply::Response(response) => Ok(response),
            Reply::NetworkError(message) => Err(NetworkError(message)),
        }
    }
}

/// Builder for one expected request.
pub struct ExpectationBuilder {
    method: Method,
    url: String,
    delay: Duration,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl ExpectationBuilder {
    /// Hold the reply back for `delay`.
    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reply 200 with a JSON body.
    pub fn return_json(self, body: Value) -> Self {
        self.return_status(200, body)
    }

    /// Reply `status` with a JSON body.
    pub fn return_status(self, status: u16, body: Value) -> Self {
        let response = HttpResponse {
            status,
            status_text: reason(status).to_string(),
            content_type: Some("application/json".to_string()),
            body: body.to_string().into_bytes(),
        };
        self.push(Reply::Response(response))
    }

    pub fn return_no_content(self) -> Self {
        self.return_raw(204, None, "")
    }

    pub fn return_raw(self, status: u16, content_type: Option<&str>, body: &str) -> Self {
        let response = HttpResponse {
            status,
            status_text: reason(status).to_string(),
            content_type: content_type.map(str::to_string),
            body: body.as_bytes().to_vec(),
        };
        self.push(Reply::Response(response))
    }

    /// Fail without a response, like a refused connection.
    pub fn return_network_error(self, message: &str) -> Self {
        self.push(Reply::NetworkError(message.to_string()))
    }

    fn push(self, reply: Reply) -> Self {
        self.expectations.lock().unwrap().push_back(Expectation {
            method: self.method,
            url: self.url.clone(),
            delay: self.delay,
            reply,
        });
        self
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}
