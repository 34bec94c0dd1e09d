//! Typed client for the Sonos cloud control API
//!
//! This crate provides the authenticated transport, the wire models and a
//! typed RPC client covering households, groups, playback, metadata,
//! sessions, library, player volume, audio clips and home theater.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sonos_api::{SonosClient, StaticToken, HouseholdId, GroupId};
//!
//! # async fn example() -> sonos_api::Result<()> {
//! let client = SonosClient::with_token(Arc::new(StaticToken::new("access-token")))?;
//! let household = HouseholdId::new("Sonos_abc");
//! let group = GroupId::new("RINCON_123:4");
//!
//! client.play(&household, &group).await?;
//! let status = client.playback_status(&household, &group).await?;
//! println!("{:?}", status.playback_state);
//! # Ok(())
//! # }
//! ```
//!
//! All cloud calls go through the [`Transport`] trait, so tests can swap in
//! the scriptable `MockTransport` (feature `test-support`).

pub mod client;
pub mod error;
pub mod ids;
pub mod service;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use client::{AppIdentity, SonosClient};
pub use error::{ApiError, Result, RESOURCE_GONE};
pub use ids::{GroupId, HouseholdId, PlayerId};
pub use service::{Namespace, NamespaceScope};
pub use transport::{
    HttpTransport, Method, StaticToken, TokenProvider, Transport, TransportConfig, DEFAULT_API_URL,
};
pub use types::{
    Favorite, Group, GroupStatus, GroupsResponse, Household, Item, MetadataStatus, ModifiedGroup,
    ModifyGroupMembersResponse, Named, PlayModes, PlaybackState, PlaybackStatus, Player,
    PlayerDevice, PlayerVolume, Playlist, SessionStatus, Track, WebhookBody,
};
