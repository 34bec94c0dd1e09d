//! SonosCloud - main entry point for the SDK
//!
//! Wires the cloud client, the event manager, the event router and
//! (optionally) a local webhook receiver, and manages the per-player
//! lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use callback_server::CallbackServer;
use futures::future::join_all;
use parking_lot::Mutex;
use sonos_api::{HouseholdId, HttpTransport, PlayerId, SonosClient, TokenProvider};
use sonos_event_manager::{
    HubEvent, LocalWebhookRegistrar, SonosEventManager, SubscriptionRegistry, WebhookRegistrar,
};
use sonos_state::{CapabilitySink, DeviceProjection, EventRouter, PlayerDirectory, PlayerInfo};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SdkConfig;
use crate::error::{Result, SdkError};
use crate::player::Player;

/// Player capabilities required to be controllable through the cloud
const REQUIRED_CAPABILITIES: [&str; 2] = ["PLAYBACK", "CLOUD"];

/// Main entry point
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sonos_api::StaticToken;
/// use sonos_sdk::{SonosCloud, PlayerInfo};
/// use sonos_state::CapabilityStore;
///
/// # async fn example() -> sonos_sdk::Result<()> {
/// let cloud = SonosCloud::builder()
///     .with_token_provider(Arc::new(StaticToken::new("access-token")))
///     .build()
///     .await?;
///
/// for info in cloud.discover_players().await? {
///     let player = cloud.add_player(info, Arc::new(CapabilityStore::new()));
///     println!("Added {}", player.name());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SonosCloud {
    config: SdkConfig,
    manager: Arc<SonosEventManager>,
    directory: PlayerDirectory,
    volume_tasks: Mutex<HashMap<PlayerId, JoinHandle<()>>>,
    router_task: JoinHandle<()>,
    callback_server: tokio::sync::Mutex<Option<CallbackServer>>,
}

/// Builder for [`SonosCloud`]
#[derive(Default)]
pub struct SonosCloudBuilder {
    config: Option<SdkConfig>,
    client: Option<SonosClient>,
    tokens: Option<Arc<dyn TokenProvider>>,
    registrar: Option<Arc<dyn WebhookRegistrar>>,
}

impl SonosCloudBuilder {
    pub fn with_config(mut self, config: SdkConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a prepared client (custom transport, app identity)
    pub fn with_client(mut self, client: SonosClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Build an HTTP client from the config with this token provider
    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// External webhook registrar; takes precedence over the local receiver
    pub fn with_webhook_registrar(mut self, registrar: Arc<dyn WebhookRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Start everything. Must be called within a tokio runtime.
    pub async fn build(self) -> Result<SonosCloud> {
        let config = self.config.unwrap_or_default();

        let client = match (self.client, self.tokens) {
            (Some(client), _) => client,
            (None, Some(tokens)) => SonosClient::new(Arc::new(HttpTransport::new(
                config.transport_config(),
                tokens,
            )?)),
            (None, None) => {
                return Err(SdkError::Config(
                    "either a client or a token provider is required".into(),
                ))
            }
        };

        let mut registrar = self.registrar;
        let mut callback_server = None;
        let mut deliveries = None;
        if registrar.is_none() && config.webhook_enabled {
            let (tx, rx) = mpsc::unbounded_channel();
            let server = match &config.webhook_host {
                Some(host) => CallbackServer::with_host(config.webhook_port_range, host, tx).await?,
                None => CallbackServer::new(config.webhook_port_range, tx).await?,
            };
            tracing::info!("Webhook receiver listening at {}", server.base_url());

            let local: Arc<dyn WebhookRegistrar> =
                Arc::new(LocalWebhookRegistrar::new(server.router().clone()));
            registrar = Some(local);
            callback_server = Some(server);
            deliveries = Some(rx);
        }

        let mut builder =
            SonosEventManager::builder(client).with_resync_config(config.resync_config());
        if let Some(registrar) = registrar {
            builder = builder.with_webhook_registrar(registrar);
        }
        let manager = Arc::new(builder.build());

        if let Some(rx) = deliveries {
            manager.forward_webhooks(rx);
        }

        let events = manager
            .take_events()
            .ok_or_else(|| SdkError::Config("event stream already taken".into()))?;
        let directory = PlayerDirectory::new();
        let router_task = tokio::spawn(EventRouter::new(directory.clone()).run(events));

        Ok(SonosCloud {
            config,
            manager,
            directory,
            volume_tasks: Mutex::new(HashMap::new()),
            router_task,
            callback_server: tokio::sync::Mutex::new(callback_server),
        })
    }
}

impl SonosCloud {
    pub fn builder() -> SonosCloudBuilder {
        SonosCloudBuilder::default()
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn client(&self) -> &SonosClient {
        self.manager.client()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        self.manager.registry()
    }

    pub fn event_manager(&self) -> &Arc<SonosEventManager> {
        &self.manager
    }

    pub fn directory(&self) -> &PlayerDirectory {
        &self.directory
    }

    /// Players of all households that can be controlled through the cloud
    pub async fn discover_players(&self) -> Result<Vec<PlayerInfo>> {
        let households = self.client().households().await?;

        let topologies = join_all(
            households
                .iter()
                .map(|household| self.client().groups(&household.id)),
        )
        .await;

        let mut players = Vec::new();
        for (household, topology) in households.iter().zip(topologies) {
            for player in topology?.players {
                if !REQUIRED_CAPABILITIES
                    .iter()
                    .all(|capability| player.has_capability(capability))
                {
                    tracing::debug!("Skipping player {} without cloud playback", player.id);
                    continue;
                }
                players.push(PlayerInfo {
                    player_id: player.id,
                    household_id: household.id.clone(),
                    name: player.name,
                });
            }
        }
        Ok(players)
    }

    /// Start projecting a player into `sink`
    ///
    /// Registers the household for topology fetches, starts the volume poll,
    /// subscribes to the player's volume namespace and queues a webhook
    /// registration for the household. Adding a player that is already
    /// present replaces it.
    pub fn add_player(&self, info: PlayerInfo, sink: Arc<dyn CapabilitySink>) -> Player {
        let player_id = info.player_id.clone();
        let household_id = info.household_id.clone();

        if let Some(previous) = self.directory.remove(&player_id) {
            tracing::debug!("Replacing player {}", player_id);
            previous.detach();
        }

        let projection = Arc::new(DeviceProjection::new(
            info,
            Arc::new(self.registry().clone()),
            sink,
        ));
        self.directory.insert(projection.clone());
        self.registry().register_household(&household_id);

        let volume_task = spawn_volume_sync(
            self.client().clone(),
            household_id.clone(),
            player_id.clone(),
            self.manager.event_sender(),
            self.config.volume_sync_interval(),
        );
        if let Some(previous) = self.volume_tasks.lock().insert(player_id.clone(), volume_task) {
            previous.abort();
        }

        let client = self.client().clone();
        let subscribe_id = player_id.clone();
        tokio::spawn(async move {
            if let Err(e) = client.player_volume_subscribe(&subscribe_id).await {
                tracing::error!("Player volume subscribe for {} failed: {}", subscribe_id, e);
            }
        });

        self.manager.spawn_webhook_registration(&household_id);

        tracing::info!("Added player {}@{}", player_id, household_id);
        Player::new(
            projection,
            self.client().clone(),
            self.directory.clone(),
            self.registry().clone(),
        )
    }

    /// Stop projecting a player and drop its subscriptions
    pub async fn remove_player(&self, player_id: &PlayerId) -> Result<()> {
        let projection = self
            .directory
            .remove(player_id)
            .ok_or_else(|| SdkError::PlayerNotFound(player_id.clone()))?;

        projection.detach();
        if let Some(task) = self.volume_tasks.lock().remove(player_id) {
            task.abort();
        }

        match self.client().player_volume_unsubscribe(player_id).await {
            Ok(()) => {}
            Err(e) if e.is_resource_gone() => {}
            Err(e) => tracing::error!("Player volume unsubscribe for {} failed: {}", player_id, e),
        }

        tracing::info!("Removed player {}", player_id);
        Ok(())
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<Player> {
        self.directory.get(player_id).map(|projection| {
            Player::new(
                projection,
                self.client().clone(),
                self.directory.clone(),
                self.registry().clone(),
            )
        })
    }

    pub fn players(&self) -> Vec<Player> {
        self.directory
            .all()
            .into_iter()
            .map(|projection| {
                Player::new(
                    projection,
                    self.client().clone(),
                    self.directory.clone(),
                    self.registry().clone(),
                )
            })
            .collect()
    }

    pub fn household_players(&self, household_id: &HouseholdId) -> Vec<Player> {
        self.players()
            .into_iter()
            .filter(|player| player.household_id() == household_id)
            .collect()
    }

    /// Base URL of the local webhook receiver, if one is running
    pub async fn webhook_url(&self) -> Option<String> {
        self.callback_server
            .lock()
            .await
            .as_ref()
            .map(|server| server.base_url().to_string())
    }

    /// Stop timers, drop the webhook and stop the receiver
    pub async fn shutdown(&self) {
        for (_, task) in self.volume_tasks.lock().drain() {
            task.abort();
        }

        self.manager.shutdown().await;
        self.router_task.abort();

        if let Some(server) = self.callback_server.lock().await.take() {
            if let Err(e) = server.shutdown().await {
                tracing::warn!("Webhook receiver shutdown failed: {}", e);
            }
        }
    }
}

impl Drop for SonosCloud {
    fn drop(&mut self) {
        for (_, task) in self.volume_tasks.get_mut().drain() {
            task.abort();
        }
        self.router_task.abort();
    }
}

/// Poll a player's volume now and then every `period`
fn spawn_volume_sync(
    client: SonosClient,
    household_id: HouseholdId,
    player_id: PlayerId,
    events: mpsc::UnboundedSender<HubEvent>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match client.player_volume(&player_id).await {
                Ok(volume) => {
                    let event = HubEvent::PlayerVolume {
                        household_id: household_id.clone(),
                        player_id: player_id.clone(),
                        volume,
                    };
                    if events.send(event).is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("Player volume fetch for {} failed: {}", player_id, e),
            }
        }
    })
}
