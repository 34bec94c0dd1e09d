//! Routes hub events to the projections they concern
//!
//! | Event            | Key                         | Receivers                         |
//! |------------------|-----------------------------|-----------------------------------|
//! | Household groups | household id                | every projection of the household |
//! | Playback/metadata| (household id, group id)    | projections bound to that group   |
//! | Player volume    | player id                   | that player's projection          |
//! | Webhook          | household id + target value | group or player match             |
//!
//! Status events for a group a projection is no longer bound to are dropped.

use sonos_event_manager::HubEvent;
use tokio::sync::mpsc;

use crate::directory::PlayerDirectory;

pub struct EventRouter {
    directory: PlayerDirectory,
}

impl EventRouter {
    pub fn new(directory: PlayerDirectory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &PlayerDirectory {
        &self.directory
    }

    /// Deliver one event; returns the number of projections it reached
    pub fn route(&self, event: &HubEvent) -> usize {
        match event {
            HubEvent::HouseholdGroups {
                household_id,
                groups,
                ..
            } => {
                let targets = self.directory.household_players(household_id);
                for projection in &targets {
                    projection.apply_topology(groups);
                }
                targets.len()
            }
            HubEvent::PlaybackStatus {
                household_id,
                group_id,
                status,
            } => {
                let targets = self.directory.group_players(household_id, group_id);
                for projection in &targets {
                    projection.apply_playback(status);
                }
                targets.len()
            }
            HubEvent::MetadataStatus {
                household_id,
                group_id,
                status,
            } => {
                let targets = self.directory.group_players(household_id, group_id);
                for projection in &targets {
                    projection.apply_metadata(status);
                }
                targets.len()
            }
            HubEvent::PlayerVolume {
                player_id, volume, ..
            } => match self.directory.get(player_id) {
                Some(projection) => {
                    projection.apply_volume(volume);
                    1
                }
                None => 0,
            },
            HubEvent::Webhook(webhook) => {
                let targets: Vec<_> = self
                    .directory
                    .household_players(&webhook.household_id)
                    .into_iter()
                    .filter(|p| webhook.targets(p.group_id().as_ref(), p.player_id()))
                    .collect();
                for projection in &targets {
                    projection.apply_webhook(webhook);
                }
                targets.len()
            }
        }
    }

    /// Drain `events` until every sender is gone
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<HubEvent>) {
        tracing::debug!("Event router started");
        while let Some(event) = events.recv().await {
            let delivered = self.route(&event);
            if delivered == 0 {
                tracing::trace!("No projection for event of household {}", event.household_id());
            }
        }
        tracing::debug!("Event router stopped");
    }
}
