//! Low-level HTTP transport for the Yamaha Extended Control API.
//!
//! This module handles request building, the HTTP round-trip and JSON body
//! decoding. It never inspects `response_code`; callers decide what a device
//! error means. For typed commands, see `commands.rs`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::{Map, Value};
use thiserror::Error;

use super::endpoints::Endpoint;
use super::traits::McTransport;
use crate::protocol_constants::{APP_NAME, HEADER_APP_NAME, HEADER_APP_PORT, HTTP_TIMEOUT_SECS};

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur while talking to a device over HTTP.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, timeout, or other client-side failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Device answered with a non-success HTTP status.
    #[error("HTTP error {0}")]
    HttpStatus(u16),

    /// Response body was not a JSON object.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Address or parameters did not form a valid URL.
    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

/// Convenient Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

impl TransportError {
    /// Returns true if retrying the same request may succeed.
    ///
    /// Retry policy belongs to callers; this only classifies the failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout() || e.is_connect(),
            TransportError::HttpStatus(status) => *status >= 500,
            TransportError::Malformed(_) | TransportError::InvalidUrl(_) => false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A single request against a device's API.
///
/// # Example
/// ```ignore
/// let request = ApiRequest::get(Endpoint::SetVolume, "192.168.1.20")
///     .zone("main")
///     .param("volume", 42);
/// let response = transport.call(request).await?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub address: String,
    pub zone: Option<String>,
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    /// Creates a GET request with no parameters.
    #[must_use]
    pub fn get(endpoint: Endpoint, address: impl Into<String>) -> Self {
        Self {
            endpoint,
            address: address.into(),
            zone: None,
            method: Method::Get,
            query: Vec::new(),
            body: None,
        }
    }

    /// Creates a POST request carrying a JSON body.
    #[must_use]
    pub fn post(endpoint: Endpoint, address: impl Into<String>, body: Value) -> Self {
        Self {
            endpoint,
            address: address.into(),
            zone: None,
            method: Method::Post,
            query: Vec::new(),
            body: Some(body),
        }
    }

    /// Sets the zone substituted into zoned endpoint paths.
    #[must_use]
    pub fn zone(mut self, zone: impl Into<String>) -> Self {
        self.zone = Some(zone.into());
        self
    }

    /// Appends a query parameter. Order is preserved.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Returns the query value for `key`, if present.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Builds the full request URL (without query string).
    #[must_use]
    pub fn url(&self) -> String {
        self.endpoint.url(&self.address, self.zone.as_deref())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Transport
// ─────────────────────────────────────────────────────────────────────────────

/// reqwest-backed transport shared by every device of a controller.
///
/// Every request carries `X-AppName`; when an event port is configured it
/// also carries `X-AppPort`, which (re)registers the UDP push subscription on
/// the device.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
    app_port: Option<u16>,
}

impl HttpTransport {
    /// Creates a transport with the given client and per-request timeout.
    #[must_use]
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            client,
            timeout,
            app_port: None,
        }
    }

    /// Creates a transport with a fresh client and the default timeout.
    pub fn with_defaults() -> TransportResult<Self> {
        let timeout = Duration::from_secs(HTTP_TIMEOUT_SECS);
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new(client, timeout))
    }

    /// Advertises `port` as the UDP event port on every request.
    #[must_use]
    pub fn with_app_port(mut self, port: u16) -> Self {
        self.app_port = Some(port);
        self
    }
}

#[async_trait]
impl McTransport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> TransportResult<Value> {
        send_api_request(&self.client, &request, self.timeout, self.app_port).await
    }
}

/// Sends one API request and decodes the response body.
///
/// # Returns
/// The decoded JSON object on any 2xx response, including device-level
/// errors (non-zero `response_code`).
pub async fn send_api_request(
    client: &Client,
    request: &ApiRequest,
    timeout: Duration,
    app_port: Option<u16>,
) -> TransportResult<Value> {
    let url = if request.query.is_empty() {
        Url::parse(&request.url())
    } else {
        Url::parse_with_params(&request.url(), &request.query)
    }
    .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    let name = request.endpoint.name();

    let mut builder = match request.method {
        Method::Get => client.get(url.clone()),
        Method::Post => client.post(url.clone()),
    };
    builder = builder.header(HEADER_APP_NAME, APP_NAME).timeout(timeout);
    if let Some(port) = app_port {
        builder = builder.header(HEADER_APP_PORT, port.to_string());
    }
    if let Some(ref body) = request.body {
        builder = builder.json(body);
    }

    log::debug!("[Transport] {} -> {}", name, url);

    let start = std::time::Instant::now();
    let res = builder.send().await;
    log::debug!(
        "[Transport] {} completed in {:?}: {:?}",
        name,
        start.elapsed(),
        res.as_ref().map(|r| r.status())
    );

    let res = res?;
    let status = res.status();
    if !status.is_success() {
        return Err(TransportError::HttpStatus(status.as_u16()));
    }

    let text = res.text().await?;
    let value = parse_response_body(&text)?;
    log::trace!("[Transport] {} response from {}: {}", name, request.address, text);
    Ok(value)
}

/// Parses a response body, requiring a top-level JSON object.
pub(crate) fn parse_response_body(text: &str) -> TransportResult<Value> {
    let map: Map<String, Value> =
        serde_json::from_str(text).map_err(|e| TransportError::Malformed(e.to_string()))?;
    Ok(Value::Object(map))
}
