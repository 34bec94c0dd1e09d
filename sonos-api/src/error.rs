use thiserror::Error;

/// Reason code the control API returns when a subscription (or any other
/// resource) no longer exists on the remote side.
pub const RESOURCE_GONE: &str = "ERROR_RESOURCE_GONE";

/// High-level API errors for Sonos cloud operations
///
/// Every failure surfaced by a [`Transport`](crate::Transport) or the
/// [`SonosClient`](crate::SonosClient) maps onto one of these variants.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Non-2xx response from the control API
    ///
    /// `reason` carries the machine-readable code from the response body
    /// (`reason`, then `errorCode`) and falls back to the HTTP status text.
    #[error("HTTP {status}: {reason}")]
    Http { status: u16, reason: String },

    /// Network communication error
    ///
    /// Connection refused, DNS failure, timeout, TLS failure.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response parsing error
    ///
    /// The API answered with a 2xx but the body could not be decoded into
    /// the expected shape.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Access token could not be obtained
    #[error("Authentication error: {0}")]
    Authentication(String),
}

impl ApiError {
    /// Build an HTTP error from a status code and a (possibly empty) body.
    pub fn from_response(status: u16, status_text: Option<&str>, body: &str) -> Self {
        let reason = extract_reason(body)
            .or_else(|| status_text.map(str::to_string))
            .unwrap_or_else(|| format!("HTTP {status}"));

        Self::Http { status, reason }
    }

    /// The machine-readable reason code, if this is an HTTP error.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Http { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Returns `true` when the remote side reports the resource is already gone.
    pub fn is_resource_gone(&self) -> bool {
        self.reason() == Some(RESOURCE_GONE)
    }

    /// HTTP status code, if this is an HTTP error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull `reason` or `errorCode` out of a JSON error body.
fn extract_reason(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    ["reason", "errorCode"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

impl From<reqwest::Error> for ApiError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            ApiError::ParseError(error.to_string())
        } else {
            ApiError::NetworkError(error.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        ApiError::ParseError(error.to_string())
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;
