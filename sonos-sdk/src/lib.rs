//! # Sonos Connect SDK
//!
//! Mirrors the state of Sonos players from the cloud control API into
//! host-provided capability sinks, and forwards commands back.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sonos_api::StaticToken;
//! use sonos_sdk::{PlayerInfo, SonosCloud};
//! use sonos_state::{Capability, CapabilityStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sonos_sdk::SdkError> {
//!     let cloud = SonosCloud::builder()
//!         .with_token_provider(Arc::new(StaticToken::new("access-token")))
//!         .build()
//!         .await?;
//!
//!     let store = Arc::new(CapabilityStore::new());
//!     let player = cloud.add_player(
//!         PlayerInfo::new("RINCON_1", "Sonos_abc", "Kitchen"),
//!         store.clone(),
//!     );
//!
//!     player.set_volume(0.3).await?;
//!     println!("{:?}", store.get(Capability::VolumeSet));
//!
//!     cloud.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! sonos-sdk (SonosCloud, Player commands)
//!     ↓
//! sonos-state (projections, event router, capability sinks)
//!     ↓
//! sonos-event-manager (ref-counted subscriptions, debounced resync, webhooks)
//!     ↓
//! sonos-api (typed cloud client)      callback-server (webhook receiver)
//! ```

pub mod artwork;
pub mod config;
mod error;
pub mod player;
pub mod system;

pub use artwork::ArtworkFetcher;
pub use config::SdkConfig;
pub use error::{
    Result, SdkError, NOT_IN_GROUP, OTHER_PLAYER_DIFFERENT_HOUSEHOLD, OTHER_PLAYER_NO_GROUP,
    PLAYER_GONE,
};
pub use player::{Player, TvPowerState};
pub use system::{SonosCloud, SonosCloudBuilder};

pub use sonos_state::{Capability, CapabilitySink, CapabilityStore, PlayerInfo, RepeatMode};
