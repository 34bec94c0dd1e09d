//! Household filter for incoming webhook deliveries.
//!
//! The `WebhookRouter` holds the set of households the integration has
//! registered a webhook for and forwards deliveries for those households to a
//! channel. Deliveries for any other household are dropped.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};

/// A single webhook delivery as received over HTTP.
///
/// Only the routing headers are interpreted; the JSON body is passed through
/// untouched for the consumer to decode.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    /// Value of the `X-Sonos-Household-Id` header
    pub household_id: String,
    /// Value of the `X-Sonos-Target-Value` header (a group or player id)
    pub target_value: String,
    /// Value of the `X-Sonos-Namespace` header, if sent
    pub namespace: Option<String>,
    /// Value of the `X-Sonos-Type` header, if sent
    pub event_type: Option<String>,
    /// Decoded JSON body
    pub body: Value,
}

/// Routes webhook deliveries for registered households to a channel.
#[derive(Clone)]
pub struct WebhookRouter {
    households: Arc<RwLock<HashSet<String>>>,
    event_sender: mpsc::UnboundedSender<WebhookPayload>,
}

impl WebhookRouter {
    /// Create a new router.
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use callback_server::{WebhookPayload, WebhookRouter};
    ///
    /// let (tx, _rx) = mpsc::unbounded_channel::<WebhookPayload>();
    /// let router = WebhookRouter::new(tx);
    /// ```
    pub fn new(event_sender: mpsc::UnboundedSender<WebhookPayload>) -> Self {
        Self {
            households: Arc::new(RwLock::new(HashSet::new())),
            event_sender,
        }
    }

    /// Accept deliveries for a household.
    pub async fn register(&self, household_id: impl Into<String>) {
        self.households.write().await.insert(household_id.into());
    }

    /// Stop accepting deliveries for a household.
    pub async fn unregister(&self, household_id: &str) {
        self.households.write().await.remove(household_id);
    }

    /// Swap the whole set of accepted households at once.
    ///
    /// Used when the webhook is re-registered with a new household set.
    pub async fn replace<I, S>(&self, household_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let next: HashSet<String> = household_ids.into_iter().map(Into::into).collect();
        *self.households.write().await = next;
    }

    pub async fn is_registered(&self, household_id: &str) -> bool {
        self.households.read().await.contains(household_id)
    }

    /// Forward a delivery if its household is registered.
    ///
    /// Returns `false` when the household is unknown and the payload was
    /// dropped.
    pub async fn route_event(&self, payload: WebhookPayload) -> bool {
        let households = self.households.read().await;

        if !households.contains(&payload.household_id) {
            return false;
        }

        // Receiver may already be gone during shutdown
        let _ = self.event_sender.send(payload);
        true
    }
}
