//! HTTP capability used to probe backend endpoints directly.

use reqwest::blocking::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Result type for HTTP operations
pub type HttpResult<T> = Result<T, HttpError>;

/// Errors that can occur while sending a request
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Could not connect to the target
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No response within the request timeout
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// Any other transport failure
    #[error("http error: {0}")]
    Transport(String),
}

/// What the harness needs from a response: only the status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
}

impl HttpResponse {
    /// 5xx: the backend failed to handle the request
    pub fn is_server_fault(&self) -> bool {
        (500..=599).contains(&self.status)
    }
}

/// Trait for HTTP clients
pub trait HttpClient: Send + Sync {
    /// POST `body` as JSON and report the response status
    fn post_json(&self, url: &str, body: &Value) -> HttpResult<HttpResponse>;
}

/// Real client backed by reqwest
#[derive(Debug, Clone)]
pub struct BlockingHttpClient {
    http: Client,
    timeout: Duration,
}

impl BlockingHttpClient {
    pub fn new(timeout: Duration) -> HttpResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { http, timeout })
    }
}

impl HttpClient for BlockingHttpClient {
    fn post_json(&self, url: &str, body: &Value) -> HttpResult<HttpResponse> {
        let response = self.http.post(url).json(body).send().map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.timeout)
            } else if e.is_connect() {
                HttpError::ConnectionFailed(e.to_string())
            } else {
                HttpError::Transport(e.to_string())
            }
        })?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
        })
    }
}

/// Canned client: answers every request with a fixed status, optionally
/// overridden per top-level JSON field name
#[derive(Debug, Clone)]
pub struct StaticHttpClient {
    default_status: u16,
    by_field: HashMap<String, u16>,
}

impl StaticHttpClient {
    pub fn new(default_status: u16) -> Self {
        Self {
            default_status,
            by_field: HashMap::new(),
        }
    }

    /// Answer `status` to any body containing `field`
    pub fn on_field(mut self, field: &str, status: u16) -> Self {
        self.by_field.insert(field.to_string(), status);
        self
    }
}

impl HttpClient for StaticHttpClient {
    fn post_json(&self, _url: &str, body: &Value) -> HttpResult<HttpResponse> {
        let status = body
            .as_object()
            .and_then(|fields| fields.keys().find_map(|k| self.by_field.get(k)))
            .copied()
            .unwrap_or(self.default_status);
        Ok(HttpResponse { status })
    }
}
