use thiserror::Error;

/// Errors raised while starting or stopping the webhook receiver
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("No available port found in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("Failed to detect local IP address")]
    LocalIpUnavailable,
}

pub type Result<T> = std::result::Result<T, WebhookError>;
