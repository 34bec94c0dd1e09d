//! Topology and status fetch jobs run by the resync schedulers

use async_trait::async_trait;
use futures::future::join_all;
use sonos_api::{GroupId, HouseholdId, SonosClient};
use tokio::sync::mpsc;

use crate::events::HubEvent;
use crate::registry::SubscriptionRegistry;
use crate::scheduler::ResyncTask;

/// Fetches the group list of every registered household
pub struct GroupTopologySync {
    client: SonosClient,
    registry: SubscriptionRegistry,
    events: mpsc::UnboundedSender<HubEvent>,
}

impl GroupTopologySync {
    pub fn new(
        client: SonosClient,
        registry: SubscriptionRegistry,
        events: mpsc::UnboundedSender<HubEvent>,
    ) -> Self {
        Self {
            client,
            registry,
            events,
        }
    }

    async fn sync_household(&self, household_id: HouseholdId) {
        match self.client.groups(&household_id).await {
            Ok(topology) => {
                tracing::debug!(
                    "Household {}: {} groups, {} players",
                    household_id,
                    topology.groups.len(),
                    topology.players.len()
                );
                let _ = self.events.send(HubEvent::HouseholdGroups {
                    household_id,
                    groups: topology.groups,
                    players: topology.players,
                });
            }
            Err(e) => {
                tracing::error!("Failed to fetch groups for household {}: {}", household_id, e);
            }
        }
    }
}

#[async_trait]
impl ResyncTask for GroupTopologySync {
    fn name(&self) -> &'static str {
        "group topology"
    }

    async fn run(&self) {
        let households = self.registry.households();
        tracing::info!("Syncing groups of {} households", households.len());

        join_all(
            households
                .into_iter()
                .map(|household_id| self.sync_household(household_id)),
        )
        .await;
    }
}

/// Fetches playback and metadata status of every subscribed group
pub struct GroupStatusSync {
    client: SonosClient,
    registry: SubscriptionRegistry,
    events: mpsc::UnboundedSender<HubEvent>,
}

impl GroupStatusSync {
    pub fn new(
        client: SonosClient,
        registry: SubscriptionRegistry,
        events: mpsc::UnboundedSender<HubEvent>,
    ) -> Self {
        Self {
            client,
            registry,
            events,
        }
    }

    async fn sync_playback(&self, household_id: &HouseholdId, group_id: &GroupId) {
        match self.client.playback_status(household_id, group_id).await {
            Ok(status) => {
                let _ = self.events.send(HubEvent::PlaybackStatus {
                    household_id: household_id.clone(),
                    group_id: group_id.clone(),
                    status,
                });
            }
            Err(e) => {
                tracing::error!("Failed to fetch playback status for group {}: {}", group_id, e);
            }
        }
    }

    async fn sync_metadata(&self, household_id: &HouseholdId, group_id: &GroupId) {
        match self.client.metadata_status(household_id, group_id).await {
            Ok(status) => {
                let _ = self.events.send(HubEvent::MetadataStatus {
                    household_id: household_id.clone(),
                    group_id: group_id.clone(),
                    status,
                });
            }
            Err(e) => {
                tracing::error!("Failed to fetch metadata status for group {}: {}", group_id, e);
            }
        }
    }

    async fn sync_group(&self, household_id: HouseholdId, group_id: GroupId) {
        tracing::debug!("Syncing status of {}/{}", household_id, group_id);
        futures::join!(
            self.sync_playback(&household_id, &group_id),
            self.sync_metadata(&household_id, &group_id),
        );
    }
}

#[async_trait]
impl ResyncTask for GroupStatusSync {
    fn name(&self) -> &'static str {
        "group status"
    }

    async fn run(&self) {
        let groups = self.registry.subscribed_groups();
        tracing::info!("Syncing status of {} groups", groups.len());

        join_all(
            groups
                .into_iter()
                .map(|(household_id, group_id)| self.sync_group(household_id, group_id)),
        )
        .await;
    }
}
