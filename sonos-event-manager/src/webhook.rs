//! Serialized webhook registration
//!
//! The cloud delivers events for all registered households to a single
//! webhook. Adding a household means tearing down the current webhook and
//! creating a new one for the full household set, so registrations must run
//! strictly one at a time.

use std::sync::Arc;

use async_trait::async_trait;
use callback_server::WebhookRouter;
use sonos_api::HouseholdId;
use tokio::sync::Mutex;

use crate::error::Result;

/// Creates webhooks delivering events for a set of households
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    async fn create_webhook(&self, household_ids: &[HouseholdId]) -> Result<Box<dyn RegisteredWebhook>>;
}

/// A live webhook created by a [`WebhookRegistrar`]
#[async_trait]
pub trait RegisteredWebhook: Send + Sync {
    async fn unregister(&self) -> Result<()>;
}

#[derive(Default)]
struct RegistrationState {
    households: Vec<HouseholdId>,
    current: Option<Box<dyn RegisteredWebhook>>,
}

/// Queue of webhook registrations, processed one at a time in call order
pub struct WebhookRegistration {
    registrar: Arc<dyn WebhookRegistrar>,
    state: Mutex<RegistrationState>,
}

impl WebhookRegistration {
    pub fn new(registrar: Arc<dyn WebhookRegistrar>) -> Self {
        Self {
            registrar,
            state: Mutex::new(RegistrationState::default()),
        }
    }

    /// Make sure the webhook covers `household_id`
    ///
    /// No-op when a live webhook already covers the household. Otherwise the
    /// current webhook is unregistered (failures are logged) and a new one is
    /// created for all households. If creation fails the household is
    /// dropped from the set and no webhook is live, so any later call
    /// recreates it.
    pub async fn register(&self, household_id: &HouseholdId) -> Result<()> {
        let mut state = self.state.lock().await;

        let covered = state.households.contains(household_id);
        if covered && state.current.is_some() {
            return Ok(());
        }

        if let Some(previous) = state.current.take() {
            if let Err(e) = previous.unregister().await {
                tracing::error!("Failed to unregister previous webhook: {}", e);
            }
        }

        if !covered {
            state.households.push(household_id.clone());
        }

        tracing::info!("Registering webhook for {} households", state.households.len());
        match self.registrar.create_webhook(&state.households).await {
            Ok(webhook) => {
                state.current = Some(webhook);
                tracing::info!("Registered webhook");
                Ok(())
            }
            Err(e) => {
                state.households.retain(|id| id != household_id);
                tracing::error!("Failed to register webhook: {}", e);
                Err(e)
            }
        }
    }

    /// Households covered by the current registration
    pub async fn households(&self) -> Vec<HouseholdId> {
        self.state.lock().await.households.clone()
    }

    /// Remove the current webhook, if any
    pub async fn unregister(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.households.clear();
        match state.current.take() {
            Some(webhook) => webhook.unregister().await,
            None => Ok(()),
        }
    }
}

/// Registrar for a self-hosted [`CallbackServer`](callback_server::CallbackServer)
///
/// Creating a webhook switches the receiver's accepted household set;
/// unregistering clears it.
pub struct LocalWebhookRegistrar {
    router: Arc<WebhookRouter>,
}

impl LocalWebhookRegistrar {
    pub fn new(router: Arc<WebhookRouter>) -> Self {
        Self { router }
    }
}

struct LocalWebhook {
    router: Arc<WebhookRouter>,
}

#[async_trait]
impl RegisteredWebhook for LocalWebhook {
    async fn unregister(&self) -> Result<()> {
        self.router.replace(Vec::<String>::new()).await;
        Ok(())
    }
}

#[async_trait]
impl WebhookRegistrar for LocalWebhookRegistrar {
    async fn create_webhook(&self, household_ids: &[HouseholdId]) -> Result<Box<dyn RegisteredWebhook>> {
        self.router
            .replace(household_ids.iter().map(|id| id.to_string()))
            .await;
        Ok(Box::new(LocalWebhook {
            router: self.router.clone(),
        }))
    }
}
