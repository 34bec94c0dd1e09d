//! # Sonos State
//!
//! Projects cloud state onto local devices.
//!
//! Every local player gets a [`DeviceProjection`]. The [`EventRouter`] hands
//! it the events it cares about: group topology of its household, status of
//! the group it is bound to, its own volume, and webhook pushes aimed at its
//! group or itself. The projection decodes them into [`Capability`] writes on
//! a host-provided [`CapabilitySink`].
//!
//! ```rust,ignore
//! let directory = PlayerDirectory::new();
//! let store = Arc::new(CapabilityStore::new());
//! directory.insert(Arc::new(DeviceProjection::new(
//!     PlayerInfo::new("RINCON_1", "Sonos_abc", "Kitchen"),
//!     Arc::new(manager.registry().clone()),
//!     store.clone(),
//! )));
//!
//! tokio::spawn(EventRouter::new(directory).run(manager.take_events().unwrap()));
//! ```

pub mod capability;
pub mod decoder;
pub mod directory;
pub mod error;
pub mod logging;
pub mod projector;
pub mod router;
pub mod store;

pub use capability::{Artwork, Capability, CapabilitySink, CapabilityValue, RepeatMode};
pub use decoder::CapabilityUpdate;
pub use directory::PlayerDirectory;
pub use error::{Result, StateError};
pub use logging::{init_logging, init_logging_from_env, LoggingError, LoggingMode};
pub use projector::{Binding, DeviceProjection, PlayerInfo};
pub use router::EventRouter;
pub use store::{CapabilityStore, StateChange};
