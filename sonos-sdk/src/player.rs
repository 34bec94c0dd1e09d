//! Player handle with the command surface
//!
//! Group-scoped commands (playback, play modes, library, sessions, line-in,
//! group volume) go to the group the player is currently bound to and fail
//! with [`SdkError::Validation`] before any remote call when it has none.
//! Player-scoped commands (volume, mute, audio clips, home theater) always
//! target the player itself.

use std::sync::Arc;
use std::time::Duration;

use sonos_api::{Favorite, GroupId, HouseholdId, PlayModes, PlayerId, Playlist, SonosClient};
use sonos_event_manager::SubscriptionRegistry;
use sonos_state::decoder::{play_modes_for_repeat, volume_percent};
use sonos_state::{Binding, DeviceProjection, PlayerDirectory, RepeatMode};

use crate::error::{
    Result, SdkError, NOT_IN_GROUP, OTHER_PLAYER_DIFFERENT_HOUSEHOLD, OTHER_PLAYER_NO_GROUP,
    PLAYER_GONE,
};

/// Power state of a connected TV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TvPowerState {
    On,
    Standby,
}

impl TvPowerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TvPowerState::On => "ON",
            TvPowerState::Standby => "STANDBY",
        }
    }
}

/// Handle to a player added to [`SonosCloud`](crate::SonosCloud)
///
/// Cheap to clone; all clones share the same projection.
///
/// ```rust,ignore
/// let player = cloud.player(&PlayerId::new("RINCON_1")).unwrap();
/// player.set_volume(0.25).await?;
/// player.play().await?;
/// ```
#[derive(Clone)]
pub struct Player {
    projection: Arc<DeviceProjection>,
    client: SonosClient,
    directory: PlayerDirectory,
    registry: SubscriptionRegistry,
}

impl Player {
    pub(crate) fn new(
        projection: Arc<DeviceProjection>,
        client: SonosClient,
        directory: PlayerDirectory,
        registry: SubscriptionRegistry,
    ) -> Self {
        Self {
            projection,
            client,
            directory,
            registry,
        }
    }

    pub fn id(&self) -> &PlayerId {
        self.projection.player_id()
    }

    pub fn household_id(&self) -> &HouseholdId {
        self.projection.household_id()
    }

    pub fn name(&self) -> &str {
        &self.projection.info().name
    }

    pub fn group_id(&self) -> Option<GroupId> {
        self.projection.group_id()
    }

    pub fn binding(&self) -> Binding {
        self.projection.binding()
    }

    pub fn projection(&self) -> &Arc<DeviceProjection> {
        &self.projection
    }

    fn require_group(&self) -> Result<GroupId> {
        self.projection
            .group_id()
            .ok_or(SdkError::Validation(NOT_IN_GROUP))
    }

    // Playback

    pub async fn play(&self) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self.client.play(self.household_id(), &group_id).await?)
    }

    pub async fn pause(&self) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self.client.pause(self.household_id(), &group_id).await?)
    }

    pub async fn set_playing(&self, playing: bool) -> Result<()> {
        if playing {
            self.play().await
        } else {
            self.pause().await
        }
    }

    pub async fn next(&self) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .skip_to_next_track(self.household_id(), &group_id)
            .await?)
    }

    pub async fn previous(&self) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .skip_to_previous_track(self.household_id(), &group_id)
            .await?)
    }

    pub async fn seek(&self, position: Duration) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .seek(
                self.household_id(),
                &group_id,
                u64::try_from(position.as_millis()).unwrap_or(u64::MAX),
            )
            .await?)
    }

    pub async fn seek_relative(&self, delta_millis: i64) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .seek_relative(self.household_id(), &group_id, delta_millis)
            .await?)
    }

    pub async fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        let group_id = self.require_group()?;
        let modes = PlayModes {
            shuffle: Some(shuffle),
            ..Default::default()
        };
        Ok(self
            .client
            .set_play_modes(self.household_id(), &group_id, &modes)
            .await?)
    }

    pub async fn set_repeat(&self, mode: RepeatMode) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .set_play_modes(self.household_id(), &group_id, &play_modes_for_repeat(mode))
            .await?)
    }

    // Player volume

    /// Set the player volume from a fraction in `0.0..=1.0`
    pub async fn set_volume(&self, fraction: f64) -> Result<()> {
        Ok(self
            .client
            .set_player_volume(self.id(), Some(volume_percent(fraction)), None)
            .await?)
    }

    pub async fn set_mute(&self, muted: bool) -> Result<()> {
        Ok(self
            .client
            .set_player_volume(self.id(), None, Some(muted))
            .await?)
    }

    pub async fn set_group_volume(&self, volume: u8) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .set_group_volume(self.household_id(), &group_id, volume.min(100))
            .await?)
    }

    // Content

    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        Ok(self.client.playlists(self.household_id()).await?)
    }

    pub async fn play_playlist(&self, playlist_id: &str) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .load_playlist(self.household_id(), &group_id, playlist_id)
            .await?)
    }

    pub async fn favorites(&self) -> Result<Vec<Favorite>> {
        Ok(self.client.favorites(self.household_id()).await?)
    }

    pub async fn play_favorite(&self, favorite_id: &str) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .load_favorite(self.household_id(), &group_id, favorite_id)
            .await?)
    }

    /// Create a playback session on the group and load a stream into it
    pub async fn play_stream_url(&self, url: &str) -> Result<()> {
        let group_id = self.require_group()?;
        let session = self
            .client
            .create_session(self.household_id(), &group_id)
            .await?;
        Ok(self
            .client
            .session_load_stream_url(&session.session_id, url, None, None)
            .await?)
    }

    pub async fn play_line_in(&self) -> Result<()> {
        let group_id = self.require_group()?;
        Ok(self
            .client
            .load_line_in(self.household_id(), &group_id, true)
            .await?)
    }

    /// Play a short clip over the current audio; `volume` is 0..=100
    pub async fn play_audio_clip(&self, url: &str, volume: Option<u8>) -> Result<()> {
        Ok(self
            .client
            .load_audio_clip(self.id(), url, volume.map(|v| v.min(100)))
            .await?)
    }

    // Home theater

    pub async fn load_home_theater_playback(&self) -> Result<()> {
        Ok(self.client.load_home_theater_playback(self.id()).await?)
    }

    pub async fn set_tv_power_state(&self, state: TvPowerState) -> Result<()> {
        Ok(self
            .client
            .set_tv_power_state(self.id(), state.as_str())
            .await?)
    }

    // Grouping

    /// Add this player to `group_id`
    ///
    /// The response must list the group's members and include this player.
    pub async fn join_group(&self, group_id: &GroupId) -> Result<()> {
        let response = self
            .client
            .modify_group_members(self.household_id(), group_id, &[self.id().clone()], &[])
            .await?;

        let members = response
            .and_then(|r| r.group)
            .and_then(|g| g.player_ids)
            .ok_or(SdkError::JoinInvalidResponse)?;
        if !members.contains(self.id()) {
            return Err(SdkError::JoinFailed);
        }

        tracing::info!("Player {} joined group {}", self.id(), group_id);
        self.registry.request_topology_sync();
        Ok(())
    }

    /// Join the group of another added player
    pub async fn join_player(&self, other: &PlayerId) -> Result<()> {
        let other = self
            .directory
            .get(other)
            .ok_or(SdkError::Validation(PLAYER_GONE))?;
        let group_id = other
            .group_id()
            .ok_or(SdkError::Validation(OTHER_PLAYER_NO_GROUP))?;
        if other.household_id() != self.household_id() {
            return Err(SdkError::Validation(OTHER_PLAYER_DIFFERENT_HOUSEHOLD));
        }

        self.join_group(&group_id).await
    }

    pub async fn leave_current_group(&self) -> Result<()> {
        let group_id = self.require_group()?;
        self.client
            .modify_group_members(self.household_id(), &group_id, &[], &[self.id().clone()])
            .await?;

        tracing::info!("Player {} left group {}", self.id(), group_id);
        self.registry.request_topology_sync();
        Ok(())
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", self.id())
            .field("household_id", self.household_id())
            .field("binding", &self.binding())
            .finish()
    }
}
