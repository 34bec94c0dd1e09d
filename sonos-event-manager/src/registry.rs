//! Reference-counted group subscriptions
//!
//! Many device projections can sit in the same group. The registry keeps one
//! listener count per (household, group) and holds exactly one remote
//! subscription per group namespace while that count is above zero.
//!
//! Remote calls are spawned onto the tokio runtime; the bookkeeping itself is
//! synchronous and never held across an await. When a group's last listener
//! leaves, its unsubscribe calls are kept per namespace until they finish; a
//! new subscribe for the same group waits for them, so the remote side always
//! sees DELETE before the next POST.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use sonos_api::{GroupId, HouseholdId, Namespace, SonosClient};

use crate::scheduler::ResyncTrigger;

/// Outcome of a namespace subscribe call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceState {
    /// Subscribe call still in flight
    Pending,
    Subscribed,
    /// Subscribe call failed; not retried until the group is resubscribed
    Failed,
}

type NamespaceHandle = Shared<BoxFuture<'static, NamespaceState>>;

/// In-flight unsubscribe of a namespace whose last listener left
type Teardown = Shared<BoxFuture<'static, ()>>;

type TeardownKey = (HouseholdId, GroupId, Namespace);

struct GroupEntry {
    listeners: usize,
    playback: NamespaceHandle,
    metadata: NamespaceHandle,
}

impl GroupEntry {
    fn handle(&self, namespace: Namespace) -> Option<&NamespaceHandle> {
        match namespace {
            Namespace::Playback => Some(&self.playback),
            Namespace::PlaybackMetadata => Some(&self.metadata),
            Namespace::PlayerVolume => None,
        }
    }
}

/// Group subscription operations used by device projections
///
/// A `None` group id means the player is not in a group; implementations
/// must not create remote subscriptions for it.
pub trait GroupSubscriptions: Send + Sync {
    fn subscribe_group(&self, household_id: &HouseholdId, group_id: Option<&GroupId>);

    fn unsubscribe_group(&self, household_id: &HouseholdId, group_id: Option<&GroupId>);

    /// Ask for a (debounced) group topology fetch
    fn request_topology_sync(&self);
}

struct RegistryInner {
    client: SonosClient,
    households: Mutex<BTreeMap<HouseholdId, BTreeMap<GroupId, GroupEntry>>>,
    /// Always locked after `households`
    teardowns: Mutex<HashMap<TeardownKey, Teardown>>,
    topology: ResyncTrigger,
    status: ResyncTrigger,
}

/// Reference-counted registry of households and group subscriptions
#[derive(Clone)]
pub struct SubscriptionRegistry {
    inner: Arc<RegistryInner>,
}

impl SubscriptionRegistry {
    pub fn new(client: SonosClient, topology: ResyncTrigger, status: ResyncTrigger) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                client,
                households: Mutex::new(BTreeMap::new()),
                teardowns: Mutex::new(HashMap::new()),
                topology,
                status,
            }),
        }
    }

    /// Mark a household as interesting and schedule a topology fetch
    pub fn register_household(&self, household_id: &HouseholdId) {
        let added = {
            let mut households = self.inner.households.lock();
            if households.contains_key(household_id) {
                false
            } else {
                households.insert(household_id.clone(), BTreeMap::new());
                true
            }
        };

        if added {
            tracing::debug!("Registered household {}", household_id);
        }
        self.inner.topology.trigger();
    }

    /// Add a listener to a group
    ///
    /// The first listener subscribes both group namespaces concurrently.
    /// Later listeners only increment the count.
    pub fn subscribe(&self, household_id: &HouseholdId, group_id: Option<&GroupId>) {
        let Some(group_id) = group_id else {
            tracing::trace!("Player in household {} has no group, nothing to subscribe", household_id);
            return;
        };

        {
            let mut households = self.inner.households.lock();
            let groups = households.entry(household_id.clone()).or_default();

            let entry = groups.entry(group_id.clone()).or_insert_with(|| GroupEntry {
                listeners: 0,
                playback: self.spawn_subscribe(Namespace::Playback, household_id, group_id),
                metadata: self.spawn_subscribe(Namespace::PlaybackMetadata, household_id, group_id),
            });

            entry.listeners += 1;
            tracing::debug!(
                "Group listener count for {}/{}: {} -> {}",
                household_id,
                group_id,
                entry.listeners - 1,
                entry.listeners
            );
        }

        self.inner.status.trigger();
    }

    /// Remove a listener from a group
    ///
    /// Dropping the last listener removes the entry and unsubscribes both
    /// namespaces. Unknown keys are ignored.
    pub fn unsubscribe(&self, household_id: &HouseholdId, group_id: Option<&GroupId>) {
        let Some(group_id) = group_id else {
            return;
        };

        let mut households = self.inner.households.lock();
        let Some(groups) = households.get_mut(household_id) else {
            tracing::warn!(
                "Attempted to unsubscribe {}/{} but household is not registered",
                household_id,
                group_id
            );
            return;
        };

        let Some(entry) = groups.get_mut(group_id) else {
            tracing::warn!(
                "Attempted to unsubscribe {}/{} but no listeners found",
                household_id,
                group_id
            );
            return;
        };

        let old_count = entry.listeners;
        entry.listeners = entry.listeners.saturating_sub(1);
        tracing::debug!(
            "Group listener count for {}/{}: {} -> {}",
            household_id,
            group_id,
            old_count,
            entry.listeners
        );
        if entry.listeners > 0 {
            return;
        }

        let Some(entry) = groups.remove(group_id) else {
            return;
        };

        // Recorded while `households` is still held so a resubscribe sees it
        let playback = self.spawn_unsubscribe(Namespace::Playback, household_id, group_id, entry.playback);
        let metadata =
            self.spawn_unsubscribe(Namespace::PlaybackMetadata, household_id, group_id, entry.metadata);

        let mut teardowns = self.inner.teardowns.lock();
        teardowns.retain(|_, teardown| teardown.peek().is_none());
        teardowns.insert((household_id.clone(), group_id.clone(), Namespace::Playback), playback);
        teardowns.insert(
            (household_id.clone(), group_id.clone(), Namespace::PlaybackMetadata),
            metadata,
        );
    }

    /// Pending unsubscribe of a namespace, if its last teardown is unfinished
    fn take_teardown(
        &self,
        namespace: Namespace,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Option<Teardown> {
        self.inner
            .teardowns
            .lock()
            .remove(&(household_id.clone(), group_id.clone(), namespace))
            .filter(|teardown| teardown.peek().is_none())
    }

    fn spawn_subscribe(
        &self,
        namespace: Namespace,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> NamespaceHandle {
        let client = self.inner.client.clone();
        let teardown = self.take_teardown(namespace, household_id, group_id);
        let household_id = household_id.clone();
        let group_id = group_id.clone();

        let handle = async move {
            if let Some(teardown) = teardown {
                tracing::debug!("Waiting for {} unsubscribe of group {} before resubscribing", namespace, group_id);
                teardown.await;
            }

            match client.subscribe_group(namespace, &household_id, &group_id).await {
                Ok(()) => {
                    tracing::info!("Subscribed to {} for group {}", namespace, group_id);
                    NamespaceState::Subscribed
                }
                Err(e) => {
                    tracing::error!("Failed to subscribe to {} for group {}: {}", namespace, group_id, e);
                    NamespaceState::Failed
                }
            }
        }
        .boxed()
        .shared();

        tokio::spawn(handle.clone());
        handle
    }

    fn spawn_unsubscribe(
        &self,
        namespace: Namespace,
        household_id: &HouseholdId,
        group_id: &GroupId,
        handle: NamespaceHandle,
    ) -> Teardown {
        let client = self.inner.client.clone();
        let household_id = household_id.clone();
        let group_id = group_id.clone();

        let teardown = async move {
            // Wait for the subscribe call so the delete cannot overtake it
            if handle.await != NamespaceState::Subscribed {
                tracing::debug!("Skipping {} unsubscribe for group {}: never subscribed", namespace, group_id);
                return;
            }

            match client.unsubscribe_group(namespace, &household_id, &group_id).await {
                Ok(()) => {
                    tracing::info!("Unsubscribed from {} for group {}", namespace, group_id);
                }
                Err(e) if e.is_resource_gone() => {
                    tracing::debug!("{} subscription for group {} already gone", namespace, group_id);
                }
                Err(e) => {
                    tracing::warn!("Failed to unsubscribe from {} for group {}: {}", namespace, group_id, e);
                }
            }
        }
        .boxed()
        .shared();

        tokio::spawn(teardown.clone());
        teardown
    }

    /// Current listener count of a group (0 when unknown)
    pub fn listener_count(&self, household_id: &HouseholdId, group_id: &GroupId) -> usize {
        self.inner
            .households
            .lock()
            .get(household_id)
            .and_then(|groups| groups.get(group_id))
            .map_or(0, |entry| entry.listeners)
    }

    /// State of a group namespace subscription, `None` when not subscribed
    pub fn namespace_state(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        namespace: Namespace,
    ) -> Option<NamespaceState> {
        let households = self.inner.households.lock();
        let handle = households.get(household_id)?.get(group_id)?.handle(namespace)?;
        Some(handle.peek().copied().unwrap_or(NamespaceState::Pending))
    }

    pub fn is_household_registered(&self, household_id: &HouseholdId) -> bool {
        self.inner.households.lock().contains_key(household_id)
    }

    /// Registered households, in id order
    pub fn households(&self) -> Vec<HouseholdId> {
        self.inner.households.lock().keys().cloned().collect()
    }

    /// Every (household, group) pair with at least one listener
    pub fn subscribed_groups(&self) -> Vec<(HouseholdId, GroupId)> {
        self.inner
            .households
            .lock()
            .iter()
            .flat_map(|(household_id, groups)| {
                groups
                    .keys()
                    .map(move |group_id| (household_id.clone(), group_id.clone()))
            })
            .collect()
    }

    /// Schedule a debounced group topology fetch
    pub fn request_topology_sync(&self) {
        self.inner.topology.trigger();
    }

    /// Schedule a debounced group status fetch
    pub fn request_status_sync(&self) {
        self.inner.status.trigger();
    }

    pub fn client(&self) -> &SonosClient {
        &self.inner.client
    }
}

impl GroupSubscriptions for SubscriptionRegistry {
    fn subscribe_group(&self, household_id: &HouseholdId, group_id: Option<&GroupId>) {
        self.subscribe(household_id, group_id);
    }

    fn unsubscribe_group(&self, household_id: &HouseholdId, group_id: Option<&GroupId>) {
        self.unsubscribe(household_id, group_id);
    }

    fn request_topology_sync(&self) {
        SubscriptionRegistry::request_topology_sync(self);
    }
}
