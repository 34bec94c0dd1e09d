//! Error types for sonos-state

use std::fmt;

use sonos_api::PlayerId;

use crate::capability::{Capability, CapabilityValue};

/// Result type for sonos-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors that can occur while projecting device state
#[derive(Debug)]
pub enum StateError {
    /// The sink does not support the capability
    UnsupportedCapability(Capability),

    /// A value of the wrong shape was written to a capability
    InvalidValue {
        capability: Capability,
        value: CapabilityValue,
    },

    /// The host refused the write
    Sink(String),

    /// No projection is registered for the player
    UnknownPlayer(PlayerId),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::UnsupportedCapability(c) => write!(f, "Unsupported capability: {}", c),
            StateError::InvalidValue { capability, value } => {
                write!(f, "Invalid value for {}: {:?}", capability, value)
            }
            StateError::Sink(msg) => write!(f, "Sink error: {}", msg),
            StateError::UnknownPlayer(id) => write!(f, "Unknown player: {}", id),
        }
    }
}

impl std::error::Error for StateError {}
