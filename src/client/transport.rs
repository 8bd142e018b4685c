use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors raised by a [`Transport`] exchange.
///
/// These cover the full lifecycle of one HTTP exchange: building the
/// request, network issues, HTTP status and reading the body.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The URL could not be turned into a request
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Failure reported by a custom transport
    #[error("{0}")]
    Other(String),
}

/// One outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct AtomRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl AtomRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A completed HTTP exchange. The body has been read in full.
#[derive(Debug, Clone)]
pub struct AtomResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Request/response exchange the client is built on.
///
/// Implementations decide what counts as failure; [`ReqwestTransport`]
/// treats any non-2xx status as [`TransportError::HttpStatus`]. Each call is
/// independent; timeouts and cancellation belong to the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, request: AtomRequest) -> Result<AtomResponse, TransportError>;
}

/// [`Transport`] over a `reqwest::Client`.
///
/// Adds the `User-Agent` and, when a token is present, an
/// `Authorization: Bearer` header to every request.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    access_token: Option<SecretString>,
    user_agent: Option<String>,
    timeout: Duration,
    max_response_size: usize,
}

/// SEC-015: The token never appears in Debug output.
impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("max_response_size", &self.max_response_size)
            .finish()
    }
}

impl ReqwestTransport {
    /// Wraps a client (caller controls its configuration) with default limits
    /// and no credentials.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            access_token: None,
            user_agent: None,
            timeout: DEFAULT_TIMEOUT,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }

    /// Builds a transport from configuration, including the bearer token.
    ///
    /// Fails only if the underlying HTTP client cannot be initialized
    /// (for example, no TLS backend).
    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let mut transport = Self::new(client)
            .with_timeout(config.timeout())
            .with_max_response_size(config.max_response_bytes)
            .with_user_agent(config.user_agent.clone());
        if let Some(token) = config.resolved_access_token() {
            transport = transport.with_access_token(token);
        }
        Ok(transport)
    }

    pub fn with_access_token(mut self, token: SecretString) -> Self {
        self.access_token = Some(token);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_response_size(mut self, limit: usize) -> Self {
        self.max_response_size = limit;
        self
    }

    pub fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    fn build(&self, request: AtomRequest) -> Result<reqwest::RequestBuilder, TransportError> {
        let url = url::Url::parse(&request.url).map_err(|e| TransportError::InvalidUrl {
            url: request.url.clone(),
            reason: e.to_string(),
        })?;

        let mut builder = self.client.request(request.method, url).headers(request.headers);
        if let Some(agent) = &self.user_agent {
            builder = builder.header(USER_AGENT, agent.as_str());
        }
        if let Some(token) = &self.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| TransportError::Other("Access token is not a valid header value".into()))?;
            value.set_sensitive(true);
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        Ok(builder)
    }

    async fn send(&self, request: AtomRequest) -> Result<AtomResponse, TransportError> {
        let url = request.url.clone();
        let response = self.build(request)?.send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = %status, "Request rejected");
            return Err(TransportError::HttpStatus(status.as_u16()));
        }

        let headers = response.headers().clone();
        let body = read_limited_bytes(response, self.max_response_size).await?;
        Ok(AtomResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn exchange(&self, request: AtomRequest) -> Result<AtomResponse, TransportError> {
        tokio::time::timeout(self.timeout, self.send(request))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, TransportError> {
    // Capture Content-Length for completeness check
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len > limit as u64 {
            return Err(TransportError::ResponseTooLarge(limit));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(TransportError::ResponseTooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    // EDGE-005: Network interruptions can end the stream early
    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(TransportError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

/// Headers every Atom request carries.
pub(crate) fn atom_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    let atom = HeaderValue::from_static(crate::atom::ATOM_CONTENT_TYPE);
    headers.insert(CONTENT_TYPE, atom.clone());
    headers.insert(ACCEPT, atom);
    headers
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_exchange_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<feed/>"))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(reqwest::Client::new());
        let response = transport
            .exchange(AtomRequest::new(Method::GET, format!("{}/feed", mock_server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"<feed/>");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1) // never retried
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(reqwest::Client::new());
        let err = transport
            .exchange(AtomRequest::new(Method::GET, mock_server.uri()))
            .await
            .unwrap_err();

        match err {
            TransportError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_bearer_token_and_user_agent_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer secret-token"))
            .and(header("user-agent", "test-agent"))
            .and(header("content-type", "application/atom+xml"))
            .and(body_string("<entry/>"))
            .respond_with(ResponseTemplate::new(201).set_body_string("<entry/>"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(reqwest::Client::new())
            .with_access_token(SecretString::from("secret-token".to_string()))
            .with_user_agent("test-agent");
        let request = AtomRequest::new(Method::POST, mock_server.uri())
            .with_body("<entry/>");
        let request = AtomRequest {
            headers: atom_headers(),
            ..request
        };

        let response = transport.exchange(request).await.unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn test_response_too_large() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(reqwest::Client::new()).with_max_response_size(16);
        let err = transport
            .exchange(AtomRequest::new(Method::GET, mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::ResponseTooLarge(16)));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(reqwest::Client::new())
            .with_timeout(Duration::from_millis(100));
        let err = transport
            .exchange(AtomRequest::new(Method::GET, mock_server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let transport = ReqwestTransport::new(reqwest::Client::new());
        let err = transport
            .exchange(AtomRequest::new(Method::GET, "not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn test_from_config_applies_limits() {
        let config = Config {
            timeout_secs: 7,
            max_response_bytes: 512,
            access_token: Some("from-file".into()),
            ..Config::default()
        };
        let transport = ReqwestTransport::from_config(&config).unwrap();
        assert_eq!(transport.timeout, Duration::from_secs(7));
        assert_eq!(transport.max_response_size, 512);
        assert!(transport.has_access_token());
        assert_eq!(transport.user_agent.as_deref(), Some(config.user_agent.as_str()));
    }

    #[test]
    fn test_debug_masks_token() {
        let transport = ReqwestTransport::new(reqwest::Client::new())
            .with_access_token(SecretString::from("hunter2".to_string()));
        let debug_output = format!("{:?}", transport);
        assert!(!debug_output.contains("hunter2"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
