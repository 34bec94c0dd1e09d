//! Events emitted towards device projections
//!
//! Three independent sources feed the same channel: periodic/debounced
//! topology and status fetches, and webhook pushes.

use callback_server::WebhookPayload;
use sonos_api::{
    Group, GroupId, HouseholdId, MetadataStatus, Namespace, PlaybackStatus, Player, PlayerId,
    PlayerVolume, WebhookBody,
};

use crate::error::Result;

/// An event for the device projections
#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    /// Result of a group topology fetch for one household
    HouseholdGroups {
        household_id: HouseholdId,
        groups: Vec<Group>,
        players: Vec<Player>,
    },

    /// Result of a playback status fetch for one group
    PlaybackStatus {
        household_id: HouseholdId,
        group_id: GroupId,
        status: PlaybackStatus,
    },

    /// Result of a metadata status fetch for one group
    MetadataStatus {
        household_id: HouseholdId,
        group_id: GroupId,
        status: MetadataStatus,
    },

    /// Result of a player volume fetch
    PlayerVolume {
        household_id: HouseholdId,
        player_id: PlayerId,
        volume: PlayerVolume,
    },

    /// Push delivery from the cloud
    Webhook(WebhookEvent),
}

impl HubEvent {
    pub fn household_id(&self) -> &HouseholdId {
        match self {
            HubEvent::HouseholdGroups { household_id, .. }
            | HubEvent::PlaybackStatus { household_id, .. }
            | HubEvent::MetadataStatus { household_id, .. }
            | HubEvent::PlayerVolume { household_id, .. } => household_id,
            HubEvent::Webhook(event) => &event.household_id,
        }
    }
}

/// A decoded webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub household_id: HouseholdId,
    /// Group id or player id the event is about
    pub target_value: String,
    pub namespace: Option<Namespace>,
    pub event_type: Option<String>,
    pub body: WebhookBody,
}

impl WebhookEvent {
    /// Decode the JSON body of a raw delivery
    pub fn from_payload(payload: WebhookPayload) -> Result<Self> {
        let body: WebhookBody = serde_json::from_value(payload.body)?;

        Ok(Self {
            household_id: HouseholdId::new(payload.household_id),
            target_value: payload.target_value,
            namespace: payload.namespace.as_deref().and_then(Namespace::from_name),
            event_type: payload.event_type,
            body,
        })
    }

    /// Whether the event targets the given group or player
    pub fn targets(&self, group_id: Option<&GroupId>, player_id: &PlayerId) -> bool {
        group_id.map_or(false, |g| *g == *self.target_value) || *player_id == *self.target_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sonos_api::GroupStatus;

    fn payload(body: serde_json::Value) -> WebhookPayload {
        WebhookPayload {
            household_id: "Sonos_1".to_string(),
            target_value: "RINCON_1:3".to_string(),
            namespace: Some("groups".to_string()),
            event_type: Some("groupCoordinatorChanged".to_string()),
            body,
        }
    }

    #[test]
    fn test_decode_payload() {
        let event =
            WebhookEvent::from_payload(payload(json!({ "groupStatus": "GROUP_STATUS_GONE" })))
                .unwrap();

        assert_eq!(event.household_id, HouseholdId::new("Sonos_1"));
        assert_eq!(event.namespace, None);
        assert_eq!(event.body.group_status, Some(GroupStatus::Gone));
    }

    #[test]
    fn test_decode_rejects_mismatched_body() {
        assert!(WebhookEvent::from_payload(payload(json!({ "volume": "loud" }))).is_err());
    }

    #[test]
    fn test_targets_group_or_player() {
        let event = WebhookEvent::from_payload(payload(json!({}))).unwrap();
        let player = PlayerId::new("RINCON_1");

        assert!(event.targets(Some(&GroupId::new("RINCON_1:3")), &player));
        assert!(!event.targets(Some(&GroupId::new("RINCON_1:4")), &player));
        assert!(!event.targets(None, &player));
        assert!(event.targets(None, &PlayerId::new("RINCON_1:3")));
    }
}
