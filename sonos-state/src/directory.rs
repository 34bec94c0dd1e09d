//! Directory of live device projections keyed by player id

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sonos_api::{GroupId, HouseholdId, PlayerId};

use crate::projector::DeviceProjection;

#[derive(Clone, Default)]
pub struct PlayerDirectory {
    players: Arc<RwLock<BTreeMap<PlayerId, Arc<DeviceProjection>>>>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a projection, returning the one it replaced
    pub fn insert(&self, projection: Arc<DeviceProjection>) -> Option<Arc<DeviceProjection>> {
        self.players
            .write()
            .insert(projection.player_id().clone(), projection)
    }

    pub fn remove(&self, player_id: &PlayerId) -> Option<Arc<DeviceProjection>> {
        self.players.write().remove(player_id)
    }

    pub fn get(&self, player_id: &PlayerId) -> Option<Arc<DeviceProjection>> {
        self.players.read().get(player_id).cloned()
    }

    pub fn contains(&self, player_id: &PlayerId) -> bool {
        self.players.read().contains_key(player_id)
    }

    /// Group the player is currently bound to
    pub fn group_of(&self, player_id: &PlayerId) -> Option<GroupId> {
        self.get(player_id).and_then(|p| p.group_id())
    }

    pub fn household_players(&self, household_id: &HouseholdId) -> Vec<Arc<DeviceProjection>> {
        self.players
            .read()
            .values()
            .filter(|p| p.household_id() == household_id)
            .cloned()
            .collect()
    }

    /// Projections bound to `group_id` in `household_id`
    pub fn group_players(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Vec<Arc<DeviceProjection>> {
        self.players
            .read()
            .values()
            .filter(|p| p.household_id() == household_id && p.is_bound_to(group_id))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<DeviceProjection>> {
        self.players.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.read().is_empty()
    }
}
