//! Event manager wiring registry, schedulers, sync jobs and webhooks

use std::sync::Arc;

use callback_server::WebhookPayload;
use parking_lot::Mutex;
use sonos_api::{HouseholdId, SonosClient};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{EventManagerError, Result};
use crate::events::{HubEvent, WebhookEvent};
use crate::registry::SubscriptionRegistry;
use crate::scheduler::{resync_channel, ResyncConfig, ResyncScheduler};
use crate::sync::{GroupStatusSync, GroupTopologySync};
use crate::webhook::{WebhookRegistrar, WebhookRegistration};

/// Owns the subscription registry and both resync schedulers
///
/// All fetched and pushed events are delivered on one channel, taken once
/// with [`SonosEventManager::take_events`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use sonos_api::{SonosClient, StaticToken, HouseholdId, GroupId};
/// use sonos_event_manager::SonosEventManager;
///
/// # async fn example() -> sonos_event_manager::Result<()> {
/// let client = SonosClient::with_token(Arc::new(StaticToken::new("token")))?;
/// let manager = SonosEventManager::builder(client).build();
/// let mut events = manager.take_events().expect("events taken once");
///
/// let household = HouseholdId::new("Sonos_abc");
/// manager.registry().register_household(&household);
/// manager.registry().subscribe(&household, Some(&GroupId::new("RINCON_1:1")));
///
/// while let Some(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// # Ok(())
/// # }
/// ```
pub struct SonosEventManager {
    client: SonosClient,
    registry: SubscriptionRegistry,
    webhooks: Option<Arc<WebhookRegistration>>,
    events_tx: mpsc::UnboundedSender<HubEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<HubEvent>>>,
    topology_scheduler: ResyncScheduler,
    status_scheduler: ResyncScheduler,
    forwarders: Mutex<Vec<JoinHandle<()>>>,
}

/// Builder for [`SonosEventManager`]
pub struct SonosEventManagerBuilder {
    client: SonosClient,
    resync: ResyncConfig,
    registrar: Option<Arc<dyn WebhookRegistrar>>,
}

impl SonosEventManagerBuilder {
    pub fn with_resync_config(mut self, config: ResyncConfig) -> Self {
        self.resync = config;
        self
    }

    pub fn with_webhook_registrar(mut self, registrar: Arc<dyn WebhookRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Spawn the schedulers. Must be called within a tokio runtime.
    pub fn build(self) -> SonosEventManager {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (topology_trigger, topology_rx) = resync_channel();
        let (status_trigger, status_rx) = resync_channel();

        let registry =
            SubscriptionRegistry::new(self.client.clone(), topology_trigger, status_trigger);

        let topology_scheduler = ResyncScheduler::spawn(
            self.resync,
            topology_rx,
            Arc::new(GroupTopologySync::new(
                self.client.clone(),
                registry.clone(),
                events_tx.clone(),
            )),
        );
        let status_scheduler = ResyncScheduler::spawn(
            self.resync,
            status_rx,
            Arc::new(GroupStatusSync::new(
                self.client.clone(),
                registry.clone(),
                events_tx.clone(),
            )),
        );

        tracing::info!(
            "Event manager started (debounce {:?}, interval {:?})",
            self.resync.debounce,
            self.resync.interval
        );

        SonosEventManager {
            client: self.client,
            registry,
            webhooks: self
                .registrar
                .map(|registrar| Arc::new(WebhookRegistration::new(registrar))),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            topology_scheduler,
            status_scheduler,
            forwarders: Mutex::new(Vec::new()),
        }
    }
}

impl SonosEventManager {
    pub fn builder(client: SonosClient) -> SonosEventManagerBuilder {
        SonosEventManagerBuilder {
            client,
            resync: ResyncConfig::default(),
            registrar: None,
        }
    }

    pub fn client(&self) -> &SonosClient {
        &self.client
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Take the event receiver; `None` after the first call
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<HubEvent>> {
        self.events_rx.lock().take()
    }

    /// Sender for events produced outside the manager (e.g. volume polls)
    pub fn event_sender(&self) -> mpsc::UnboundedSender<HubEvent> {
        self.events_tx.clone()
    }

    /// Make sure the webhook covers `household_id`
    ///
    /// Registrations are serialized. Without a registrar this is a no-op.
    pub async fn register_webhook(&self, household_id: &HouseholdId) -> Result<()> {
        match &self.webhooks {
            Some(webhooks) => webhooks.register(household_id).await,
            None => Ok(()),
        }
    }

    /// Fire-and-forget variant of [`register_webhook`](Self::register_webhook)
    pub fn spawn_webhook_registration(&self, household_id: &HouseholdId) {
        let Some(webhooks) = self.webhooks.clone() else {
            return;
        };
        let household_id = household_id.clone();
        tokio::spawn(async move {
            if let Err(e) = webhooks.register(&household_id).await {
                tracing::error!("Webhook registration for {} failed: {}", household_id, e);
            }
        });
    }

    pub fn has_webhooks(&self) -> bool {
        self.webhooks.is_some()
    }

    /// Decode raw deliveries from a webhook receiver into the event stream
    pub fn forward_webhooks(&self, mut deliveries: mpsc::UnboundedReceiver<WebhookPayload>) {
        let events = self.events_tx.clone();
        let handle = tokio::spawn(async move {
            while let Some(payload) = deliveries.recv().await {
                match WebhookEvent::from_payload(payload) {
                    Ok(event) => {
                        if events.send(HubEvent::Webhook(event)).is_err() {
                            tracing::debug!("Event receiver dropped, stopping webhook forwarding");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Dropping undecodable webhook delivery: {}", e);
                    }
                }
            }
        });
        self.forwarders.lock().push(handle);
    }

    /// Push a decoded webhook event into the stream
    pub fn push_webhook(&self, event: WebhookEvent) -> Result<()> {
        self.events_tx
            .send(HubEvent::Webhook(event))
            .map_err(|_| EventManagerError::ChannelClosed)
    }

    /// Stop both schedulers and webhook forwarding, and remove the webhook
    pub async fn shutdown(&self) {
        self.topology_scheduler.shutdown();
        self.status_scheduler.shutdown();

        for handle in self.forwarders.lock().drain(..) {
            handle.abort();
        }

        if let Some(webhooks) = &self.webhooks {
            if let Err(e) = webhooks.unregister().await {
                tracing::warn!("Failed to unregister webhook on shutdown: {}", e);
            }
        }

        tracing::info!("Event manager shut down");
    }
}

impl Drop for SonosEventManager {
    fn drop(&mut self) {
        tracing::debug!(
            "SonosEventManager dropping, {} subscribed groups",
            self.registry.subscribed_groups().len()
        );

        for handle in self.forwarders.get_mut().drain(..) {
            handle.abort();
        }
    }
}
