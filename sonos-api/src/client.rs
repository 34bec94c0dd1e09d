use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::ids::{GroupId, HouseholdId, PlayerId};
use crate::service::Namespace;
use crate::transport::{HttpTransport, Method, TokenProvider, Transport, TransportConfig};
use crate::types::{
    Favorite, GroupsResponse, Household, MetadataStatus, ModifyGroupMembersResponse, PlayModes,
    PlaybackStatus, PlayerVolume, Playlist, SessionStatus,
};

/// How this integration identifies itself to the control API
///
/// Sent with playback sessions and audio clips; the display name doubles as
/// the default station name for stream URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppIdentity {
    pub app_id: String,
    pub app_context: String,
    pub display_name: String,
}

impl Default for AppIdentity {
    fn default() -> Self {
        Self {
            app_id: "com.sonos-connect".to_string(),
            app_context: "sonos-connect".to_string(),
            display_name: "Sonos Connect".to_string(),
        }
    }
}

/// Typed client for the Sonos control API
///
/// Every method is a thin RPC over the [`Transport`]: it builds the path and
/// body, awaits the call and decodes the response. Errors propagate
/// unmodified as [`ApiError`](crate::ApiError).
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sonos_api::{SonosClient, StaticToken, HouseholdId};
///
/// # async fn example() -> sonos_api::Result<()> {
/// let client = SonosClient::with_token(Arc::new(StaticToken::new("access-token")))?;
/// for household in client.households().await? {
///     let topology = client.groups(&household.id).await?;
///     println!("{} groups", topology.groups.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SonosClient {
    transport: Arc<dyn Transport>,
    app: AppIdentity,
}

impl std::fmt::Debug for SonosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SonosClient").field("app", &self.app).finish()
    }
}

#[derive(Deserialize)]
struct HouseholdsEnvelope {
    #[serde(default)]
    households: Vec<Household>,
}

#[derive(Deserialize)]
struct PlaylistsEnvelope {
    #[serde(default)]
    playlists: Vec<Playlist>,
}

#[derive(Deserialize)]
struct FavoritesEnvelope {
    #[serde(default)]
    items: Vec<Favorite>,
}

fn group_path(household_id: &HouseholdId, group_id: &GroupId, suffix: &str) -> String {
    format!("/households/{}/groups/{}/{}", household_id, group_id, suffix)
}

fn session_path(session_id: &str, suffix: &str) -> String {
    format!("/playbackSessions/{}/playbackSession/{}", session_id, suffix)
}

impl SonosClient {
    /// Create a client over any transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            app: AppIdentity::default(),
        }
    }

    /// Create a client talking to the production API with the given tokens
    pub fn with_token(tokens: Arc<dyn TokenProvider>) -> Result<Self> {
        let transport = HttpTransport::new(TransportConfig::default(), tokens)?;
        Ok(Self::new(Arc::new(transport)))
    }

    /// Replace the app identity sent with sessions and audio clips
    pub fn with_app_identity(mut self, app: AppIdentity) -> Self {
        self.app = app;
        self
    }

    pub fn app_identity(&self) -> &AppIdentity {
        &self.app
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.transport.request(Method::Get, path, None).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> Result<T> {
        let value = self.transport.request(Method::Post, path, Some(body)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// POST whose response body carries nothing of interest
    async fn command(&self, path: &str, body: Value) -> Result<()> {
        self.transport.request(Method::Post, path, Some(body)).await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.transport.request(Method::Delete, path, None).await?;
        Ok(())
    }

    // Households & groups

    pub async fn households(&self) -> Result<Vec<Household>> {
        let envelope: HouseholdsEnvelope = self.get("/households").await?;
        Ok(envelope.households)
    }

    /// Fetch the current groups and players of a household
    pub async fn groups(&self, household_id: &HouseholdId) -> Result<GroupsResponse> {
        self.get(&format!("/households/{}/groups", household_id)).await
    }

    /// Add and/or remove players from a group
    ///
    /// Returns `None` when the response body does not have the expected
    /// shape; callers decide whether that is an error.
    pub async fn modify_group_members(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        player_ids_to_add: &[PlayerId],
        player_ids_to_remove: &[PlayerId],
    ) -> Result<Option<ModifyGroupMembersResponse>> {
        let value = self
            .transport
            .request(
                Method::Post,
                &group_path(household_id, group_id, "groups/modifyGroupMembers"),
                Some(json!({
                    "playerIdsToAdd": player_ids_to_add,
                    "playerIdsToRemove": player_ids_to_remove,
                })),
            )
            .await?;
        Ok(serde_json::from_value::<Option<ModifyGroupMembersResponse>>(value)
            .ok()
            .flatten())
    }

    /// Set the volume of a whole group (0..=100)
    pub async fn set_group_volume(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        volume: u8,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "groupVolume"),
            json!({ "volume": volume }),
        )
        .await
    }

    // Namespace: playback

    pub async fn playback_status(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<PlaybackStatus> {
        self.get(&group_path(household_id, group_id, "playback")).await
    }

    pub async fn play(&self, household_id: &HouseholdId, group_id: &GroupId) -> Result<()> {
        self.command(&group_path(household_id, group_id, "playback/play"), json!({}))
            .await
    }

    pub async fn pause(&self, household_id: &HouseholdId, group_id: &GroupId) -> Result<()> {
        self.command(&group_path(household_id, group_id, "playback/pause"), json!({}))
            .await
    }

    /// Seek to an absolute position within the current track
    pub async fn seek(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        position_millis: u64,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "playback/seek"),
            json!({ "positionMillis": position_millis }),
        )
        .await
    }

    /// Seek forwards (positive) or backwards (negative) from the current position
    pub async fn seek_relative(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        delta_millis: i64,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "playback/seekRelative"),
            json!({ "deltaMillis": delta_millis }),
        )
        .await
    }

    pub async fn load_line_in(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        play_on_completion: bool,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "playback/lineIn"),
            json!({ "playOnCompletion": play_on_completion }),
        )
        .await
    }

    /// Change play modes; fields left `None` are not sent
    pub async fn set_play_modes(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        play_modes: &PlayModes,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "playback/playMode"),
            json!({ "playModes": play_modes }),
        )
        .await
    }

    pub async fn skip_to_next_track(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "playback/skipToNextTrack"),
            json!({}),
        )
        .await
    }

    pub async fn skip_to_previous_track(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "playback/skipToPreviousTrack"),
            json!({}),
        )
        .await
    }

    // Namespace: playbackMetadata

    pub async fn metadata_status(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<MetadataStatus> {
        self.get(&group_path(household_id, group_id, "playbackMetadata"))
            .await
    }

    // Group-scoped subscriptions

    /// Subscribe to a group namespace (`playback` or `playbackMetadata`)
    pub async fn subscribe_group(
        &self,
        namespace: Namespace,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<()> {
        self.command(
            &namespace.group_subscription_path(household_id, group_id),
            json!({}),
        )
        .await
    }

    pub async fn unsubscribe_group(
        &self,
        namespace: Namespace,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<()> {
        self.delete(&namespace.group_subscription_path(household_id, group_id))
            .await
    }

    pub async fn playback_subscribe(&self, household_id: &HouseholdId, group_id: &GroupId) -> Result<()> {
        self.subscribe_group(Namespace::Playback, household_id, group_id)
            .await
    }

    pub async fn playback_unsubscribe(&self, household_id: &HouseholdId, group_id: &GroupId) -> Result<()> {
        self.unsubscribe_group(Namespace::Playback, household_id, group_id)
            .await
    }

    pub async fn metadata_subscribe(&self, household_id: &HouseholdId, group_id: &GroupId) -> Result<()> {
        self.subscribe_group(Namespace::PlaybackMetadata, household_id, group_id)
            .await
    }

    pub async fn metadata_unsubscribe(&self, household_id: &HouseholdId, group_id: &GroupId) -> Result<()> {
        self.unsubscribe_group(Namespace::PlaybackMetadata, household_id, group_id)
            .await
    }

    // Namespace: playbackSession

    fn session_body(&self) -> Value {
        json!({
            "appId": self.app.app_id,
            "appContext": self.app.app_context,
        })
    }

    pub async fn create_session(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<SessionStatus> {
        self.post(
            &group_path(household_id, group_id, "playbackSession"),
            self.session_body(),
        )
        .await
    }

    /// Join this app's existing session on the group or create a new one
    pub async fn join_or_create_session(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
    ) -> Result<SessionStatus> {
        self.post(
            &group_path(household_id, group_id, "playbackSession/joinOrCreate"),
            self.session_body(),
        )
        .await
    }

    pub async fn session_subscribe(&self, session_id: &str) -> Result<()> {
        self.command(&session_path(session_id, "subscription"), json!({}))
            .await
    }

    pub async fn session_unsubscribe(&self, session_id: &str) -> Result<()> {
        self.delete(&session_path(session_id, "subscription")).await
    }

    /// Load a stream URL into a session
    ///
    /// The station name defaults to the app display name.
    pub async fn session_load_stream_url(
        &self,
        session_id: &str,
        stream_url: &str,
        item_id: Option<&str>,
        station_name: Option<&str>,
    ) -> Result<()> {
        let station_name = station_name.unwrap_or(&self.app.display_name);
        self.command(
            &session_path(session_id, "loadStreamUrl"),
            json!({
                "itemId": item_id,
                "streamUrl": stream_url,
                "stationMetadata": { "name": station_name },
                "playOnCompletion": true,
            }),
        )
        .await
    }

    pub async fn session_seek(
        &self,
        session_id: &str,
        item_id: Option<&str>,
        position_millis: u64,
    ) -> Result<()> {
        self.command(
            &session_path(session_id, "seek"),
            json!({
                "itemId": item_id,
                "positionMillis": position_millis,
            }),
        )
        .await
    }

    // Namespace: playlists

    pub async fn playlists(&self, household_id: &HouseholdId) -> Result<Vec<Playlist>> {
        let envelope: PlaylistsEnvelope = self
            .get(&format!("/households/{}/playlists", household_id))
            .await?;
        Ok(envelope.playlists)
    }

    /// Replace the group's queue with a playlist and start playing
    pub async fn load_playlist(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        playlist_id: &str,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "playlists"),
            json!({
                "playlistId": playlist_id,
                "playOnCompletion": true,
                "action": "REPLACE",
            }),
        )
        .await
    }

    // Namespace: favorites

    pub async fn favorites(&self, household_id: &HouseholdId) -> Result<Vec<Favorite>> {
        let envelope: FavoritesEnvelope = self
            .get(&format!("/households/{}/favorites", household_id))
            .await?;
        Ok(envelope.items)
    }

    /// Replace the group's queue with a favorite and start playing
    pub async fn load_favorite(
        &self,
        household_id: &HouseholdId,
        group_id: &GroupId,
        favorite_id: &str,
    ) -> Result<()> {
        self.command(
            &group_path(household_id, group_id, "favorites"),
            json!({
                "favoriteId": favorite_id,
                "playOnCompletion": true,
                "action": "REPLACE",
            }),
        )
        .await
    }

    // Namespace: playerVolume

    pub async fn player_volume(&self, player_id: &PlayerId) -> Result<PlayerVolume> {
        self.get(&format!("/players/{}/playerVolume", player_id))
            .await
    }

    /// Set volume and/or mute of a single player; `None` fields are not sent
    pub async fn set_player_volume(
        &self,
        player_id: &PlayerId,
        volume: Option<u8>,
        muted: Option<bool>,
    ) -> Result<()> {
        let body = PlayerVolume {
            volume,
            muted,
            fixed: None,
        };
        self.command(
            &format!("/players/{}/playerVolume", player_id),
            serde_json::to_value(body)?,
        )
        .await
    }

    pub async fn player_volume_subscribe(&self, player_id: &PlayerId) -> Result<()> {
        self.command(
            &Namespace::PlayerVolume.player_subscription_path(player_id),
            json!({}),
        )
        .await
    }

    pub async fn player_volume_unsubscribe(&self, player_id: &PlayerId) -> Result<()> {
        self.delete(&Namespace::PlayerVolume.player_subscription_path(player_id))
            .await
    }

    // Namespace: audioClip

    /// Play a short clip on top of the current audio
    pub async fn load_audio_clip(
        &self,
        player_id: &PlayerId,
        stream_url: &str,
        volume: Option<u8>,
    ) -> Result<()> {
        self.command(
            &format!("/players/{}/audioClip", player_id),
            json!({
                "name": self.app.display_name,
                "volume": volume,
                "streamUrl": stream_url,
                "appId": self.app.app_id,
            }),
        )
        .await
    }

    // Namespace: homeTheater

    pub async fn load_home_theater_playback(&self, player_id: &PlayerId) -> Result<()> {
        self.command(&format!("/players/{}/homeTheater", player_id), json!({}))
            .await
    }

    /// `tv_power_state` is `ON` or `STANDBY`
    pub async fn set_tv_power_state(&self, player_id: &PlayerId, tv_power_state: &str) -> Result<()> {
        self.command(
            &format!("/players/{}/homeTheater/tvPowerState", player_id),
            json!({ "tvPowerState": tv_power_state }),
        )
        .await
    }
}
