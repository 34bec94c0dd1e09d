use sonos_api::ApiError;
use thiserror::Error;

/// Errors that can occur in the Sonos Event Manager
#[derive(Error, Debug)]
pub enum EventManagerError {
    /// Remote call failed
    #[error("API call failed: {0}")]
    Api(#[from] ApiError),

    /// Webhook receiver could not be started
    #[error("Webhook receiver error: {0}")]
    Webhook(#[from] callback_server::WebhookError),

    /// Webhook registration with the cloud failed
    #[error("Webhook registration failed: {0}")]
    Registration(String),

    /// Webhook body did not match any known shape
    #[error("Failed to decode webhook body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Event channel closed
    #[error("Event channel has been closed")]
    ChannelClosed,
}

/// Result type for Event Manager operations
pub type Result<T> = std::result::Result<T, EventManagerError>;
