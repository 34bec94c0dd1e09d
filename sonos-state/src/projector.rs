//! Device state projector
//!
//! A [`DeviceProjection`] mirrors one player. It tracks which group the
//! player is bound to, keeps the group subscriptions in line with that
//! binding, and writes decoded status into its [`CapabilitySink`].
//!
//! ```text
//!   Unbound ──(topology: group found)──▶ Bound(g)
//!   Bound(g) ──(topology: no group)──▶ Unbound
//!   Bound(g) ──(topology: g' != g, or group updated)──▶ Bound(g')
//! ```
//!
//! Within one projection an unsubscribe of the old group is always issued
//! before the subscribe of the new one. A detached projection ignores every
//! later event, so a stale handle cannot bind again.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sonos_api::{Group, GroupId, HouseholdId, MetadataStatus, PlaybackStatus, PlayerId, PlayerVolume};
use sonos_event_manager::{GroupSubscriptions, WebhookEvent};

use crate::capability::{Artwork, Capability, CapabilitySink, CapabilityValue};
use crate::decoder::{self, CapabilityUpdate};

/// Identity of a player handed over by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub player_id: PlayerId,
    pub household_id: HouseholdId,
    #[serde(default)]
    pub name: String,
}

impl PlayerInfo {
    pub fn new(
        player_id: impl Into<PlayerId>,
        household_id: impl Into<HouseholdId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            household_id: household_id.into(),
            name: name.into(),
        }
    }
}

/// Group binding of a projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Unbound,
    Bound(GroupId),
}

impl Binding {
    pub fn group_id(&self) -> Option<&GroupId> {
        match self {
            Binding::Unbound => None,
            Binding::Bound(group_id) => Some(group_id),
        }
    }
}

struct ProjectionState {
    binding: Binding,
    /// Set by a webhook saying the group changed; forces a resubscribe on
    /// the next topology event even if the group id is unchanged
    group_was_updated: bool,
    group_name: Option<String>,
    artwork: Option<Artwork>,
    detached: bool,
}

/// Projection of one player's cloud state
pub struct DeviceProjection {
    info: PlayerInfo,
    subscriptions: Arc<dyn GroupSubscriptions>,
    sink: Arc<dyn CapabilitySink>,
    state: Mutex<ProjectionState>,
}

impl DeviceProjection {
    pub fn new(
        info: PlayerInfo,
        subscriptions: Arc<dyn GroupSubscriptions>,
        sink: Arc<dyn CapabilitySink>,
    ) -> Self {
        Self {
            info,
            subscriptions,
            sink,
            state: Mutex::new(ProjectionState {
                binding: Binding::Unbound,
                group_was_updated: false,
                group_name: None,
                artwork: None,
                detached: false,
            }),
        }
    }

    pub fn info(&self) -> &PlayerInfo {
        &self.info
    }

    pub fn player_id(&self) -> &PlayerId {
        &self.info.player_id
    }

    pub fn household_id(&self) -> &HouseholdId {
        &self.info.household_id
    }

    pub fn sink(&self) -> &Arc<dyn CapabilitySink> {
        &self.sink
    }

    pub fn binding(&self) -> Binding {
        self.state.lock().binding.clone()
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.state.lock().binding.group_id().cloned()
    }

    pub fn group_name(&self) -> Option<String> {
        self.state.lock().group_name.clone()
    }

    pub fn is_bound_to(&self, group_id: &GroupId) -> bool {
        self.state.lock().binding.group_id() == Some(group_id)
    }

    pub fn group_was_updated(&self) -> bool {
        self.state.lock().group_was_updated
    }

    pub fn is_detached(&self) -> bool {
        self.state.lock().detached
    }

    /// Rebind after a group topology fetch of this player's household
    ///
    /// The first group whose member list contains the player wins.
    pub fn apply_topology(&self, groups: &[Group]) {
        let found = groups
            .iter()
            .find(|group| group.contains_player(&self.info.player_id));

        let mut state = self.state.lock();
        if state.detached {
            return;
        }
        let household_id = &self.info.household_id;

        match (found, state.binding.clone()) {
            (None, Binding::Unbound) => {}
            (None, Binding::Bound(old)) => {
                tracing::info!("Player {} left group {}", self.info.player_id, old);
                self.subscriptions.unsubscribe_group(household_id, Some(&old));
                state.binding = Binding::Unbound;
                state.group_name = None;
                drop(state);
                self.write(Capability::SonosGroup, CapabilityValue::Null);
            }
            (Some(group), Binding::Bound(old)) if old == group.id && !state.group_was_updated => {
                state.group_name = Some(group.name.clone());
                drop(state);
                self.write(Capability::SonosGroup, group.name.as_str().into());
            }
            (Some(group), old) => {
                if let Some(old) = old.group_id() {
                    self.subscriptions.unsubscribe_group(household_id, Some(old));
                }
                self.subscriptions.subscribe_group(household_id, Some(&group.id));
                tracing::info!(
                    "Player {} bound to group {} ({})",
                    self.info.player_id,
                    group.id,
                    group.name
                );

                state.binding = Binding::Bound(group.id.clone());
                state.group_was_updated = false;
                state.group_name = Some(group.name.clone());
                drop(state);
                self.write(Capability::SonosGroup, group.name.as_str().into());
            }
        }
    }

    pub fn apply_playback(&self, status: &PlaybackStatus) {
        if self.is_detached() {
            return;
        }
        self.apply(decoder::decode_playback(status));
    }

    pub fn apply_metadata(&self, status: &MetadataStatus) {
        if self.is_detached() {
            return;
        }
        self.apply(decoder::decode_metadata(status));
    }

    pub fn apply_volume(&self, volume: &PlayerVolume) {
        if self.is_detached() {
            return;
        }
        self.apply(decoder::decode_volume(volume));
    }

    /// Apply a push delivery targeting this player or its group
    pub fn apply_webhook(&self, event: &WebhookEvent) {
        if self.is_detached() {
            tracing::trace!("Ignoring webhook for detached player {}", self.info.player_id);
            return;
        }

        if let Some(status) = event.body.group_status {
            if status.invalidates_subscription() {
                tracing::debug!(
                    "Group status {:?} for player {}, resyncing topology",
                    status,
                    self.info.player_id
                );
                self.state.lock().group_was_updated = true;
                self.subscriptions.request_topology_sync();
            }
        }

        self.apply(decoder::decode_webhook(&event.body));
    }

    /// Drop the group binding and its subscriptions
    ///
    /// Final: later topology, status and webhook events are ignored.
    pub fn detach(&self) {
        let mut state = self.state.lock();
        state.detached = true;
        if let Binding::Bound(old) = std::mem::replace(&mut state.binding, Binding::Unbound) {
            self.subscriptions
                .unsubscribe_group(&self.info.household_id, Some(&old));
        }
        state.group_name = None;
    }

    fn apply(&self, updates: Vec<CapabilityUpdate>) {
        for update in updates {
            match update {
                CapabilityUpdate::Set(capability, value) => self.write(capability, value),
                CapabilityUpdate::Art(artwork) => self.write_artwork(artwork),
            }
        }
    }

    fn write(&self, capability: Capability, value: CapabilityValue) {
        if !self.sink.has_capability(capability) {
            return;
        }
        if let Err(e) = self.sink.set_value(capability, value) {
            tracing::warn!(
                "Failed to set {} on player {}: {}",
                capability,
                self.info.player_id,
                e
            );
        }
    }

    fn write_artwork(&self, artwork: Artwork) {
        {
            let mut state = self.state.lock();
            if state.artwork.as_ref() == Some(&artwork) {
                return;
            }
            state.artwork = Some(artwork.clone());
        }
        if let Err(e) = self.sink.set_artwork(artwork) {
            tracing::warn!("Failed to set artwork on player {}: {}", self.info.player_id, e);
        }
    }
}

impl std::fmt::Debug for DeviceProjection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceProjection")
            .field("info", &self.info)
            .field("binding", &self.binding())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::CapabilityStore;
    use proptest::prelude::*;
    use sonos_api::GroupStatus;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Call {
        Subscribe(String),
        Unsubscribe(String),
        TopologySync,
    }

    #[derive(Default)]
    pub(crate) struct RecordingSubscriptions {
        pub calls: Mutex<Vec<Call>>,
    }

    impl RecordingSubscriptions {
        pub fn take(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl GroupSubscriptions for RecordingSubscriptions {
        fn subscribe_group(&self, _household_id: &HouseholdId, group_id: Option<&GroupId>) {
            if let Some(group_id) = group_id {
                self.calls.lock().push(Call::Subscribe(group_id.to_string()));
            }
        }

        fn unsubscribe_group(&self, _household_id: &HouseholdId, group_id: Option<&GroupId>) {
            if let Some(group_id) = group_id {
                self.calls.lock().push(Call::Unsubscribe(group_id.to_string()));
            }
        }

        fn request_topology_sync(&self) {
            self.calls.lock().push(Call::TopologySync);
        }
    }

    pub(crate) fn group(id: &str, name: &str, players: &[&str]) -> Group {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "name": name,
            "playerIds": players,
        }))
        .unwrap()
    }

    pub(crate) fn webhook(target: &str, body: serde_json::Value) -> WebhookEvent {
        WebhookEvent {
            household_id: HouseholdId::new("h1"),
            target_value: target.to_string(),
            namespace: None,
            event_type: None,
            body: serde_json::from_value(body).unwrap(),
        }
    }

    fn projection() -> (DeviceProjection, Arc<RecordingSubscriptions>, Arc<CapabilityStore>) {
        let subs = Arc::new(RecordingSubscriptions::default());
        let store = Arc::new(CapabilityStore::new());
        let projection = DeviceProjection::new(
            PlayerInfo::new("p1", "h1", "Kitchen"),
            subs.clone(),
            store.clone(),
        );
        (projection, subs, store)
    }

    #[test]
    fn test_first_topology_binds_and_subscribes() {
        let (projection, subs, store) = projection();

        projection.apply_topology(&[group("g0", "Other", &["p9"]), group("g1", "Kitchen", &["p1"])]);

        assert_eq!(projection.binding(), Binding::Bound(GroupId::new("g1")));
        assert_eq!(subs.take(), vec![Call::Subscribe("g1".into())]);
        assert_eq!(store.get(Capability::SonosGroup), Some("Kitchen".into()));
    }

    #[test]
    fn test_same_group_makes_no_calls() {
        let (projection, subs, store) = projection();
        projection.apply_topology(&[group("g1", "Kitchen", &["p1"])]);
        subs.take();

        projection.apply_topology(&[group("g1", "Kitchen + Den", &["p1", "p2"])]);

        assert!(subs.take().is_empty());
        assert_eq!(store.get(Capability::SonosGroup), Some("Kitchen + Den".into()));
    }

    #[test]
    fn test_group_change_unsubscribes_before_subscribing() {
        let (projection, subs, _) = projection();
        projection.apply_topology(&[group("g1", "Kitchen", &["p1"])]);
        subs.take();

        projection.apply_topology(&[group("g2", "Everywhere", &["p2", "p1"])]);

        assert_eq!(
            subs.take(),
            vec![Call::Unsubscribe("g1".into()), Call::Subscribe("g2".into())]
        );
        assert!(projection.is_bound_to(&GroupId::new("g2")));
    }

    #[test]
    fn test_no_group_unbinds_and_clears_label() {
        let (projection, subs, store) = projection();
        projection.apply_topology(&[group("g1", "Kitchen", &["p1"])]);
        subs.take();

        projection.apply_topology(&[group("g2", "Den", &["p2"])]);

        assert_eq!(projection.binding(), Binding::Unbound);
        assert_eq!(subs.take(), vec![Call::Unsubscribe("g1".into())]);
        assert_eq!(store.get(Capability::SonosGroup), Some(CapabilityValue::Null));

        projection.apply_topology(&[]);
        assert!(subs.take().is_empty());
    }

    #[test]
    fn test_group_updated_forces_resubscribe() {
        let (projection, subs, _) = projection();
        projection.apply_topology(&[group("g1", "Kitchen", &["p1"])]);
        subs.take();

        projection.apply_webhook(&webhook("g1", serde_json::json!({ "groupStatus": "GROUP_STATUS_UPDATED" })));
        assert!(projection.group_was_updated());
        assert_eq!(subs.take(), vec![Call::TopologySync]);

        projection.apply_topology(&[group("g1", "Kitchen", &["p1"])]);
        assert_eq!(
            subs.take(),
            vec![Call::Unsubscribe("g1".into()), Call::Subscribe("g1".into())]
        );
        assert!(!projection.group_was_updated());
    }

    #[test]
    fn test_group_gone_triggers_one_topology_sync() {
        let (projection, subs, _) = projection();
        let event = webhook("g1", serde_json::json!({ "groupStatus": "GROUP_STATUS_GONE" }));
        assert_eq!(event.body.group_status, Some(GroupStatus::Gone));

        projection.apply_webhook(&event);

        assert_eq!(subs.take(), vec![Call::TopologySync]);
        assert!(projection.group_was_updated());
    }

    #[test]
    fn test_moved_status_is_ignored() {
        let (projection, subs, _) = projection();
        projection.apply_webhook(&webhook("g1", serde_json::json!({ "groupStatus": "GROUP_STATUS_MOVED" })));
        assert!(subs.take().is_empty());
        assert!(!projection.group_was_updated());
    }

    #[test]
    fn test_volume_mapping() {
        let (projection, _, store) = projection();
        projection.apply_volume(&PlayerVolume {
            volume: Some(42),
            muted: Some(true),
            fixed: None,
        });
        assert_eq!(store.get(Capability::VolumeSet), Some(CapabilityValue::Number(0.42)));
        assert_eq!(store.get(Capability::VolumeMute), Some(CapabilityValue::Bool(true)));
    }

    #[test]
    fn test_unsupported_capabilities_are_skipped() {
        let subs = Arc::new(RecordingSubscriptions::default());
        let store = Arc::new(CapabilityStore::with_capabilities([Capability::VolumeMute]));
        let projection = DeviceProjection::new(PlayerInfo::new("p1", "h1", "Kitchen"), subs, store.clone());

        projection.apply_volume(&PlayerVolume {
            volume: Some(42),
            muted: Some(false),
            fixed: None,
        });

        assert_eq!(store.get(Capability::VolumeSet), None);
        assert_eq!(store.get(Capability::VolumeMute), Some(CapabilityValue::Bool(false)));
    }

    #[test]
    fn test_artwork_only_written_on_change() {
        let (projection, _, store) = projection();
        let mut changes = store.subscribe_changes();
        let metadata: MetadataStatus = serde_json::from_value(serde_json::json!({
            "currentItem": { "track": { "imageUrl": "http://10.0.0.2/art.jpg" } }
        }))
        .unwrap();

        projection.apply_metadata(&metadata);
        projection.apply_metadata(&metadata);

        assert_eq!(store.artwork(), Artwork::Proxied("http://10.0.0.2/art.jpg".into()));
        let mut art_changes = 0;
        while let Ok(change) = changes.try_recv() {
            if matches!(change, crate::store::StateChange::Artwork(_)) {
                art_changes += 1;
            }
        }
        assert_eq!(art_changes, 1);
    }

    proptest! {
        /// Replaying the recorded calls always leaves exactly the bound
        /// group subscribed
        #[test]
        fn prop_calls_track_binding(memberships in prop::collection::vec(prop::option::of(0u8..3), 1..20)) {
            let (projection, subs, _) = projection();
            let mut live: Vec<String> = Vec::new();

            for membership in memberships {
                let groups: Vec<Group> = membership
                    .map(|g| vec![group(&format!("g{}", g), "G", &["p1"])])
                    .unwrap_or_default();
                projection.apply_topology(&groups);

                for call in subs.take() {
                    match call {
                        Call::Subscribe(g) => live.push(g),
                        Call::Unsubscribe(g) => {
                            let idx = live.iter().position(|l| *l == g);
                            prop_assert!(idx.is_some());
                            live.remove(idx.unwrap());
                        }
                        Call::TopologySync => {}
                    }
                }

                let expected: Vec<String> = projection.group_id().map(|g| g.to_string()).into_iter().collect();
                prop_assert_eq!(&live, &expected);
            }
        }
    }

    #[test]
    fn test_detach_unsubscribes_bound_group() {
        let (projection, subs, _) = projection();
        projection.apply_topology(&[group("g1", "Kitchen", &["p1"])]);
        subs.take();

        projection.detach();
        projection.detach();

        assert_eq!(subs.take(), vec![Call::Unsubscribe("g1".into())]);
        assert_eq!(projection.binding(), Binding::Unbound);
    }

    #[test]
    fn test_detached_projection_ignores_later_events() {
        let (projection, subs, store) = projection();
        let projection = Arc::new(projection);
        projection.apply_topology(&[group("g1", "Kitchen", &["p1"])]);

        // A router still holding the old handle keeps delivering
        let stale = projection.clone();
        projection.detach();
        stale.apply_topology(&[group("g1", "Kitchen", &["p1"])]);
        stale.apply_webhook(&webhook("g1", serde_json::json!({ "groupStatus": "GROUP_STATUS_UPDATED" })));
        stale.apply_volume(&PlayerVolume {
            volume: Some(10),
            muted: None,
            fixed: None,
        });

        assert_eq!(
            subs.take(),
            vec![Call::Subscribe("g1".into()), Call::Unsubscribe("g1".into())]
        );
        assert!(stale.is_detached());
        assert_eq!(stale.binding(), Binding::Unbound);
        assert!(!stale.group_was_updated());
        assert_eq!(store.get(Capability::VolumeSet), None);
    }
}
