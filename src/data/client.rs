//! Remote species API client
//!
//! This module defines the `Transport` seam the repository uses to reach the
//! remote API, an HTTP implementation built on reqwest, and an offline
//! implementation that always fails so every request falls back to local data.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Default base URL for the species API
pub const DEFAULT_API_BASE_URL: &str = "https://api.seahere.app/";

/// Errors that can occur when talking to the API
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The server answered with a status other than 2xx or 304
    #[error("Unexpected HTTP status: {0}")]
    Status(u16),

    /// Network access is disabled
    #[error("Network unavailable: {0}")]
    Offline(String),

    /// The request path could not be joined onto the base URL
    #[error("Invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A raw API response
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Value of the `ETag` response header, if present
    pub etag: Option<String>,
    /// Parsed JSON body. `None` when the body is empty or not JSON.
    pub body: Option<Value>,
}

impl ApiResponse {
    /// A 200 response carrying `body`
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            etag: None,
            body: Some(body),
        }
    }

    /// A 304 response
    pub fn not_modified() -> Self {
        Self {
            status: 304,
            etag: None,
            body: None,
        }
    }

    /// A bodiless response with an arbitrary status
    pub fn with_status(status: u16) -> Self {
        Self {
            status,
            etag: None,
            body: None,
        }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == StatusCode::NOT_MODIFIED.as_u16()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests against the species API
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `path` (e.g. `/api/species/sea-otter`)
    ///
    /// `if_none_match` carries a previously stored validator. Any status is
    /// returned as a response; only failures to get a response at all are
    /// errors.
    async fn get(&self, path: &str, if_none_match: Option<&str>) -> Result<ApiResponse, ApiError>;
}

/// Transport that reaches the API over HTTP
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport for the given base URL
    pub fn new(base_url: Url) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a transport with a custom HTTP client
    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn request_url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str, if_none_match: Option<&str>) -> Result<ApiResponse, ApiError> {
        let url = self.request_url(path)?;

        let mut request = self
            .client
            .get(url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(etag) = if_none_match {
            request = request.header(IF_NONE_MATCH, etag);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response.bytes().await?;
        let body = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        Ok(ApiResponse { status, etag, body })
    }
}

/// Transport used when network access is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn get(&self, path: &str, _if_none_match: Option<&str>) -> Result<ApiResponse, ApiError> {
        Err(ApiError::Offline(format!("not fetching {}", path)))
    }
}

/// Characters escaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encodes one path segment (`sea otter` becomes `sea%20otter`)
pub fn encode_path_segment(value: &str) -> String {
    utf8_percent_encode(value, PATH_SEGMENT).to_string()
}

/// Form-encodes a query string value (`sea otter` becomes `sea+otter`)
pub fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
