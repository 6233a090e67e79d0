//! HTTP Transport
//!
//! HTTP client interface and implementations for token exchanges and
//! upstream API calls.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{AuthError, NetworkError, ProtocolError};
use crate::types::DEFAULT_TIMEOUT;

/// Largest response body accepted from the provider or the API.
pub const MAX_RESPONSE_SIZE: usize = 1048576; // 1MB

/// HTTP request definition.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<String>,
    /// Request timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request without headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Set a header. Names are stored lowercased.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Set a JSON body.
    pub fn json_body(mut self, body: &serde_json::Value) -> Self {
        self.body = Some(body.to_string());
        self.header("content-type", "application/json")
    }
}

/// HTTP method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// HTTP response definition.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Create a response with a JSON body.
    pub fn json<T: serde::Serialize>(status: u16, body: &T) -> Self {
        Self {
            status,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: serde_json::to_string(body).unwrap_or_default(),
        }
    }

    /// Create a response with a plain-text body.
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_str(&self.body).map_err(|e| ProtocolError::InvalidJson {
            message: e.to_string(),
        })
    }
}

/// Encode key/value pairs as an `application/x-www-form-urlencoded` body.
pub fn encode_form<K: AsRef<str>, V: AsRef<str>>(params: &[(K, V)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key.as_ref(), value.as_ref());
    }
    serializer.finish()
}

/// HTTP transport interface (for dependency injection).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send an HTTP request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError>;
}

/// Default reqwest-based HTTP transport.
pub struct ReqwestHttpTransport {
    client: reqwest::Client,
    default_timeout: Duration,
    max_response_size: usize,
}

impl ReqwestHttpTransport {
    /// Create new transport with the default 10 second timeout.
    pub fn new() -> Result<Self, AuthError> {
        Self::with_options(DEFAULT_TIMEOUT, MAX_RESPONSE_SIZE)
    }

    /// Create transport with custom options.
    pub fn with_options(timeout: Duration, max_response_size: usize) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| NetworkError::ClientInit {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            default_timeout: timeout,
            max_response_size,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        let response = req_builder.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout { timeout }
            } else {
                NetworkError::ConnectionFailed {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();

        // Redirects are never followed for token or API calls
        if (300..400).contains(&status) {
            let location = response
                .headers()
                .get("location")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            return Err(ProtocolError::UnexpectedRedirect { location }.into());
        }

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string().to_lowercase(), v.to_string());
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > self.max_response_size {
                return Err(ProtocolError::ResponseTooLarge { size: len as usize }.into());
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProtocolError::InvalidResponse {
                message: e.to_string(),
            })?;

        if body.len() > self.max_response_size {
            return Err(ProtocolError::ResponseTooLarge { size: body.len() }.into());
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Mock HTTP transport for testing. Replays queued outcomes in order.
#[derive(Default)]
pub struct MockHttpTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, NetworkError>>>,
    request_history: Mutex<Vec<HttpRequest>>,
}

impl MockHttpTransport {
    /// Create new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.lock_responses().push_back(Ok(response));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json_response<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        self.queue_response(HttpResponse::json(status, body))
    }

    /// Queue a transport failure.
    pub fn queue_network_error(&self, error: NetworkError) -> &Self {
        self.lock_responses().push_back(Err(error));
        self
    }

    /// Get request history.
    pub fn get_requests(&self) -> Vec<HttpRequest> {
        self.lock_history().clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.lock_history().len()
    }

    /// Get last request.
    pub fn get_last_request(&self) -> Option<HttpRequest> {
        self.lock_history().last().cloned()
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<HttpResponse, NetworkError>>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<HttpRequest>> {
        self.request_history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl HttpTransport for MockHttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, AuthError> {
        self.lock_history().push(request);

        match self.lock_responses().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(error.into()),
            None => Err(NetworkError::ConnectionFailed {
                message: "No mock response available".to_string(),
            }
            .into()),
        }
    }
}
