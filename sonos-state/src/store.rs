//! In-memory capability store
//!
//! [`CapabilityStore`] is the default [`CapabilitySink`]: it keeps the latest
//! value of every capability and broadcasts a [`StateChange`] whenever a
//! value actually changes.
//!
//! ```rust,ignore
//! let store = CapabilityStore::new();
//! let mut changes = store.subscribe_changes();
//!
//! tokio::spawn(async move {
//!     while let Ok(change) = changes.recv().await {
//!         println!("{:?}", change);
//!     }
//! });
//! ```

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::capability::{Artwork, Capability, CapabilitySink, CapabilityValue};
use crate::error::{Result, StateError};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A change in the store
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Value {
        capability: Capability,
        value: CapabilityValue,
    },
    Artwork(Artwork),
}

#[derive(Default)]
struct StoreState {
    values: HashMap<Capability, CapabilityValue>,
    artwork: Artwork,
}

pub struct CapabilityStore {
    supported: BTreeSet<Capability>,
    state: RwLock<StoreState>,
    changes: broadcast::Sender<StateChange>,
}

impl CapabilityStore {
    /// Store supporting every capability
    pub fn new() -> Self {
        Self::with_capabilities(Capability::ALL)
    }

    pub fn with_capabilities(capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            supported: capabilities.into_iter().collect(),
            state: RwLock::new(StoreState::default()),
            changes,
        }
    }

    /// Current value; `None` if never written
    pub fn get(&self, capability: Capability) -> Option<CapabilityValue> {
        self.state.read().values.get(&capability).cloned()
    }

    pub fn artwork(&self) -> Artwork {
        self.state.read().artwork.clone()
    }

    /// Snapshot of all written values
    pub fn snapshot(&self) -> HashMap<Capability, CapabilityValue> {
        self.state.read().values.clone()
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<StateChange> {
        self.changes.subscribe()
    }

    fn publish(&self, change: StateChange) {
        // No receivers is fine
        let _ = self.changes.send(change);
    }
}

impl Default for CapabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilitySink for CapabilityStore {
    fn has_capability(&self, capability: Capability) -> bool {
        self.supported.contains(&capability)
    }

    fn set_value(&self, capability: Capability, value: CapabilityValue) -> Result<()> {
        if !self.has_capability(capability) {
            return Err(StateError::UnsupportedCapability(capability));
        }
        if !capability.accepts(&value) {
            return Err(StateError::InvalidValue { capability, value });
        }

        {
            let mut state = self.state.write();
            if state.values.get(&capability) == Some(&value) {
                return Ok(());
            }
            state.values.insert(capability, value.clone());
        }

        tracing::trace!("{} = {:?}", capability, value);
        self.publish(StateChange::Value { capability, value });
        Ok(())
    }

    fn set_artwork(&self, artwork: Artwork) -> Result<()> {
        {
            let mut state = self.state.write();
            if state.artwork == artwork {
                return Ok(());
            }
            state.artwork = artwork.clone();
        }

        self.publish(StateChange::Artwork(artwork));
        Ok(())
    }
}
