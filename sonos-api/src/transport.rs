//! Authenticated request/response transport for the control API
//!
//! The [`Transport`] trait is the seam every cloud call goes through. The
//! production implementation, [`HttpTransport`], speaks JSON over HTTPS with
//! a bearer token supplied by a [`TokenProvider`]. The OAuth2 exchange that
//! produces those tokens lives outside this crate.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ApiError, Result};

/// Production base URL of the Sonos control API
pub const DEFAULT_API_URL: &str = "https://api.ws.sonos.com/control/api/v1";

/// HTTP verbs used by the control API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authenticated JSON request/response channel
///
/// `path` is relative to the API base (e.g. `/households`). A 2xx response
/// with an empty body yields [`Value::Null`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value>;
}

/// Supplies bearer tokens for outgoing requests
///
/// Implementations own refresh; the transport simply asks for a token before
/// every request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Token provider returning a fixed access token
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Transport configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// API base URL, without trailing slash
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("sonos-connect/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| ApiError::NetworkError(format!("failed to build HTTP client: {e}")))
    }
}

/// reqwest-backed [`Transport`]
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let http = config.build_client()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let token = self.tokens.access_token().await?;
        let url = self.url(path);

        let builder = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Delete => self.http.delete(&url),
        }
        .bearer_auth(token);

        let builder = match body {
            Some(json) => builder.json(&json),
            None => builder,
        };

        tracing::trace!("{} {}", method, path);
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let error = ApiError::from_response(status.as_u16(), status.canonical_reason(), &text);
            tracing::debug!("{} {} failed: {}", method, path, error);
            return Err(error);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }
}
