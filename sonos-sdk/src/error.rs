use sonos_api::PlayerId;
use thiserror::Error;

/// Validation message when a group command targets a player without a group
pub const NOT_IN_GROUP: &str = "Speaker not in Group";
pub const PLAYER_GONE: &str = "Player does not exist anymore";
pub const OTHER_PLAYER_NO_GROUP: &str = "Other player has no group";
pub const OTHER_PLAYER_DIFFERENT_HOUSEHOLD: &str = "Other player is in different household";

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("State management error: {0}")]
    StateError(#[from] sonos_state::StateError),

    #[error("API error: {0}")]
    ApiError(#[from] sonos_api::ApiError),

    #[error("Event manager error: {0}")]
    EventManager(#[from] sonos_event_manager::EventManagerError),

    #[error("Webhook receiver error: {0}")]
    Webhook(#[from] callback_server::WebhookError),

    /// A command was rejected before any remote call
    #[error("{0}")]
    Validation(&'static str),

    #[error("Invalid response when adding player to group")]
    JoinInvalidResponse,

    #[error("Player was not added to the group")]
    JoinFailed,

    #[error("Player not found: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Artwork error: {0}")]
    Artwork(String),
}

pub type Result<T> = std::result::Result<T, SdkError>;
