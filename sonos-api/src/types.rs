//! Wire models for the control API
//!
//! Every field that the API may omit is an `Option`; partial payloads are
//! normal (webhooks in particular carry only the fields that changed).

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, HouseholdId, PlayerId};

/// A household visible to the authenticated account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Household {
    pub id: HouseholdId,
    #[serde(default)]
    pub name: Option<String>,
}

/// A group of players playing in sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub coordinator_id: Option<PlayerId>,
    #[serde(default)]
    pub playback_state: Option<PlaybackState>,
    #[serde(default)]
    pub player_ids: Vec<PlayerId>,
}

impl Group {
    /// Check if a player is a member of this group
    pub fn contains_player(&self, player_id: &PlayerId) -> bool {
        self.player_ids.iter().any(|id| id == player_id)
    }

    /// Number of member players
    pub fn member_count(&self) -> usize {
        self.player_ids.len()
    }
}

/// Hardware unit belonging to a player (a stereo pair has two)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDevice {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// A logical player in the household
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub devices: Vec<PlayerDevice>,
}

impl Player {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Comma separated serial numbers of the player's devices
    pub fn serial_numbers(&self) -> Option<String> {
        if self.devices.is_empty() {
            return None;
        }
        Some(
            self.devices
                .iter()
                .filter_map(|d| d.serial_number.as_deref())
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// Response of the household group listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsResponse {
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub players: Vec<Player>,
}

/// Playback state of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    #[serde(rename = "PLAYBACK_STATE_IDLE")]
    Idle,
    #[serde(rename = "PLAYBACK_STATE_BUFFERING")]
    Buffering,
    #[serde(rename = "PLAYBACK_STATE_PAUSED")]
    Paused,
    #[serde(rename = "PLAYBACK_STATE_PLAYING")]
    Playing,
    #[serde(other)]
    Unknown,
}

/// Play mode flags; absent fields are left untouched by `setPlayModes`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayModes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_one: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crossfade: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shuffle: Option<bool>,
}

/// `playback` namespace status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    #[serde(default)]
    pub playback_state: Option<PlaybackState>,
    #[serde(default)]
    pub play_modes: Option<PlayModes>,
    #[serde(default)]
    pub position_millis: Option<u64>,
}

/// Object carrying only a display name (artist, album)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub album: Option<Named>,
    #[serde(default)]
    pub artist: Option<Named>,
    #[serde(default)]
    pub duration_millis: Option<u64>,
}

/// Item in the playback queue or stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default)]
    pub track: Option<Track>,
}

/// `playbackMetadata` namespace status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataStatus {
    #[serde(default)]
    pub current_item: Option<Item>,
    #[serde(default)]
    pub next_item: Option<Item>,
}

/// `playerVolume` namespace status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerVolume {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed: Option<bool>,
}

/// Status attached to group-scoped webhook events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    #[serde(rename = "GROUP_STATUS_GONE")]
    Gone,
    #[serde(rename = "GROUP_STATUS_UPDATED")]
    Updated,
    #[serde(rename = "GROUP_STATUS_MOVED")]
    Moved,
    #[serde(other)]
    Unknown,
}

impl GroupStatus {
    /// Whether the group's remote subscriptions must be re-established
    pub fn invalidates_subscription(&self) -> bool {
        matches!(self, GroupStatus::Gone | GroupStatus::Updated)
    }
}

/// Body of a webhook push; any subset of fields may be present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    #[serde(default)]
    pub group_status: Option<GroupStatus>,
    #[serde(default)]
    pub playback_state: Option<PlaybackState>,
    #[serde(default)]
    pub play_modes: Option<PlayModes>,
    #[serde(default)]
    pub current_item: Option<Item>,
    #[serde(default)]
    pub position_millis: Option<u64>,
    #[serde(default)]
    pub volume: Option<u8>,
    #[serde(default)]
    pub muted: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub track_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Playback session created for stream URL playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub session_id: String,
    #[serde(default)]
    pub session_state: Option<String>,
    #[serde(default)]
    pub session_created: Option<bool>,
}

/// Group as returned by `modifyGroupMembers`
///
/// Kept fully optional: callers validate the shape themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedGroup {
    #[serde(default)]
    pub id: Option<GroupId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub player_ids: Option<Vec<PlayerId>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyGroupMembersResponse {
    #[serde(default)]
    pub group: Option<ModifiedGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups_response_decoding() {
        let json = r#"{
            "groups": [
                {"id": "g1", "name": "Kitchen", "coordinatorId": "p1",
                 "playbackState": "PLAYBACK_STATE_PLAYING", "playerIds": ["p1", "p2"]}
            ],
            "players": [
                {"id": "p1", "name": "Kitchen", "capabilities": ["PLAYBACK", "CLOUD"],
                 "devices": [{"id": "d1", "serialNumber": "AA-1"}]}
            ]
        }"#;

        let response: GroupsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.groups.len(), 1);
        let group = &response.groups[0];
        assert!(group.contains_player(&PlayerId::new("p2")));
        assert!(!group.contains_player(&PlayerId::new("p3")));
        assert_eq!(group.playback_state, Some(PlaybackState::Playing));

        let player = &response.players[0];
        assert!(player.has_capability("CLOUD"));
        assert_eq!(player.serial_numbers().as_deref(), Some("AA-1"));
    }

    #[test]
    fn test_unknown_enum_values_are_tolerated() {
        let status: PlaybackStatus =
            serde_json::from_str(r#"{"playbackState": "PLAYBACK_STATE_SOMETHING_NEW"}"#).unwrap();
        assert_eq!(status.playback_state, Some(PlaybackState::Unknown));

        let body: WebhookBody =
            serde_json::from_str(r#"{"groupStatus": "GROUP_STATUS_WHATEVER"}"#).unwrap();
        assert_eq!(body.group_status, Some(GroupStatus::Unknown));
        assert!(!GroupStatus::Unknown.invalidates_subscription());
    }

    #[test]
    fn test_partial_webhook_body() {
        let body: WebhookBody = serde_json::from_str(r#"{"volume": 42}"#).unwrap();
        assert_eq!(body.volume, Some(42));
        assert_eq!(body.muted, None);
        assert_eq!(body.current_item, None);
    }

    #[test]
    fn test_play_modes_omit_absent_fields() {
        let modes = PlayModes {
            shuffle: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&modes).unwrap(), r#"{"shuffle":true}"#);
    }
}
