//! # Sonos Event Manager
//!
//! Reference-counted group subscriptions and debounced state resync for the
//! Sonos cloud control API.
//!
//! ## Overview
//!
//! Many local device projections can share one household and one group. The
//! event manager makes sure the remote side sees exactly one subscription per
//! group namespace while anybody is listening, and keeps local state fresh
//! from three sources:
//!
//! - **Group topology fetches** for every registered household
//! - **Group status fetches** (playback + metadata) for every subscribed group
//! - **Webhook pushes** decoded from a webhook receiver
//!
//! Fetches are driven by two [`ResyncScheduler`]s. Each trigger restarts a
//! short debounce timer and a long fallback interval, so bursts of triggers
//! collapse into one fetch and state still refreshes when nothing happens.
//!
//! ## Architecture
//!
//! 1. **Household registration**: a household becomes part of topology fetches
//! 2. **Demand-driven subscriptions**: the first listener of a group subscribes
//!    the `playback` and `playbackMetadata` namespaces
//! 3. **Reference counting**: each further listener increments a count
//! 4. **Automatic cleanup**: the last listener leaving unsubscribes both namespaces
//! 5. **Serialized webhook registration**: one registration at a time
//!
//! This is the same idea as RxJS's `refCount()` or a ref-counted connection pool.

pub mod error;
pub mod events;
pub mod manager;
pub mod registry;
pub mod scheduler;
pub mod sync;
pub mod webhook;

pub use error::{EventManagerError, Result};
pub use events::{HubEvent, WebhookEvent};
pub use manager::{SonosEventManager, SonosEventManagerBuilder};
pub use registry::{GroupSubscriptions, NamespaceState, SubscriptionRegistry};
pub use scheduler::{resync_channel, ResyncConfig, ResyncScheduler, ResyncTask, ResyncTrigger};
pub use sync::{GroupStatusSync, GroupTopologySync};
pub use webhook::{LocalWebhookRegistrar, RegisteredWebhook, WebhookRegistrar, WebhookRegistration};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        EventManagerError, GroupSubscriptions, HubEvent, ResyncConfig, Result, SonosEventManager,
        SubscriptionRegistry, WebhookEvent,
    };
}
