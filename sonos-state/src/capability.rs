//! Capability keys and values exposed by a device projection
//!
//! A projection writes its state into a [`CapabilitySink`]. The sink decides
//! which capabilities it supports; writes to anything else are skipped.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Capability keys written by the projector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    SpeakerPlaying,
    VolumeSet,
    VolumeMute,
    SpeakerTrack,
    SpeakerArtist,
    SpeakerAlbum,
    SpeakerDuration,
    SpeakerPosition,
    SonosGroup,
    SpeakerRepeat,
    SpeakerShuffle,
}

impl Capability {
    pub const ALL: [Capability; 11] = [
        Capability::SpeakerPlaying,
        Capability::VolumeSet,
        Capability::VolumeMute,
        Capability::SpeakerTrack,
        Capability::SpeakerArtist,
        Capability::SpeakerAlbum,
        Capability::SpeakerDuration,
        Capability::SpeakerPosition,
        Capability::SonosGroup,
        Capability::SpeakerRepeat,
        Capability::SpeakerShuffle,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Capability::SpeakerPlaying => "speaker_playing",
            Capability::VolumeSet => "volume_set",
            Capability::VolumeMute => "volume_mute",
            Capability::SpeakerTrack => "speaker_track",
            Capability::SpeakerArtist => "speaker_artist",
            Capability::SpeakerAlbum => "speaker_album",
            Capability::SpeakerDuration => "speaker_duration",
            Capability::SpeakerPosition => "speaker_position",
            Capability::SonosGroup => "sonos_group",
            Capability::SpeakerRepeat => "speaker_repeat",
            Capability::SpeakerShuffle => "speaker_shuffle",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Whether `value` has the right shape for this capability. `Null` is
    /// always accepted.
    pub fn accepts(&self, value: &CapabilityValue) -> bool {
        match value {
            CapabilityValue::Null => true,
            CapabilityValue::Bool(_) => matches!(
                self,
                Capability::SpeakerPlaying | Capability::VolumeMute | Capability::SpeakerShuffle
            ),
            CapabilityValue::Number(n) => {
                n.is_finite()
                    && matches!(
                        self,
                        Capability::VolumeSet
                            | Capability::SpeakerDuration
                            | Capability::SpeakerPosition
                    )
            }
            CapabilityValue::Text(_) => matches!(
                self,
                Capability::SpeakerTrack
                    | Capability::SpeakerArtist
                    | Capability::SpeakerAlbum
                    | Capability::SonosGroup
                    | Capability::SpeakerRepeat
            ),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Value of a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilityValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Null,
}

impl CapabilityValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CapabilityValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CapabilityValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CapabilityValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CapabilityValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for CapabilityValue {
    fn from(b: bool) -> Self {
        CapabilityValue::Bool(b)
    }
}

impl From<f64> for CapabilityValue {
    fn from(n: f64) -> Self {
        CapabilityValue::Number(n)
    }
}

impl From<String> for CapabilityValue {
    fn from(s: String) -> Self {
        CapabilityValue::Text(s)
    }
}

impl From<&str> for CapabilityValue {
    fn from(s: &str) -> Self {
        CapabilityValue::Text(s.to_string())
    }
}

impl<T: Into<CapabilityValue>> From<Option<T>> for CapabilityValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CapabilityValue::Null, Into::into)
    }
}

/// Repeat mode as exposed through `speaker_repeat`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    None,
    Track,
    Playlist,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::None => "none",
            RepeatMode::Track => "track",
            RepeatMode::Playlist => "playlist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(RepeatMode::None),
            "track" => Some(RepeatMode::Track),
            "playlist" => Some(RepeatMode::Playlist),
            _ => None,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Album art of the current track
///
/// Secure URLs are handed out as-is. Plain `http:` art has to be fetched
/// and re-served by the host as a byte stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Artwork {
    #[default]
    None,
    Url(String),
    Proxied(String),
}

impl Artwork {
    pub fn from_url(url: Option<&str>) -> Self {
        match url {
            Some(url) if url.starts_with("https:") => Artwork::Url(url.to_string()),
            Some(url) if url.starts_with("http:") => Artwork::Proxied(url.to_string()),
            _ => Artwork::None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Artwork::None => None,
            Artwork::Url(url) | Artwork::Proxied(url) => Some(url),
        }
    }
}

/// Destination of projected state, usually a host device object
pub trait CapabilitySink: Send + Sync {
    fn has_capability(&self, capability: Capability) -> bool;

    fn set_value(&self, capability: Capability, value: CapabilityValue) -> Result<()>;

    fn set_artwork(&self, artwork: Artwork) -> Result<()>;
}
