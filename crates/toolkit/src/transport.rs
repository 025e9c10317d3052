//! HTTP transport to the remote backend.
//!
//! The [`RemoteTransport`] trait is the seam used by the retrying client;
//! [`ReqwestTransport`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Header carrying the backend credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// A response that reached us, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Decoded JSON body, or the raw text as a JSON string when the body
    /// is not JSON.
    pub body: Value,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Short description of the body for error messages.
    pub fn error_text(&self) -> String {
        let text = match &self.body {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("message")
                .or_else(|| map.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| self.body.to_string()),
            other => other.to_string(),
        };
        text.chars().take(500).collect()
    }
}

/// Failures before a response was obtained.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Timeouts and connection failures are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// `POST {base}{endpoint}` with a JSON body.
    async fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;

    /// `GET {base}{endpoint}`.
    async fn get_json(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError>;
}

/// reqwest-backed transport for a single backend instance.
pub struct ReqwestTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl ReqwestTransport {
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8080`.
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, api_key)
    }

    /// Reuse an existing [`reqwest::Client`] for connection pooling.
    pub fn with_client(
        client: reqwest::Client,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let api_url: String = api_url.into();
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.api_url, endpoint.trim_start_matches('/'))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<TransportResponse, TransportError> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(classify)?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok(TransportResponse { status, body })
    }
}

#[async_trait]
impl RemoteTransport for ReqwestTransport {
    async fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let request = self.client.post(self.url(endpoint)).json(body).timeout(timeout);
        self.send(request).await
    }

    async fn get_json(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        let request = self.client.get(self.url(endpoint)).timeout(timeout);
        self.send(request).await
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}
