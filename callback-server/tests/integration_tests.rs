//! Integration tests for the webhook receiver.
//!
//! These tests start a real HTTP server, send actual HTTP requests,
//! and verify end-to-end functionality.

use callback_server::{CallbackServer, WebhookPayload};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn start(
    range: (u16, u16),
) -> (CallbackServer, mpsc::UnboundedReceiver<WebhookPayload>) {
    let (tx, rx) = mpsc::unbounded_channel::<WebhookPayload>();
    let server = CallbackServer::with_host(range, "127.0.0.1", tx)
        .await
        .expect("Failed to create callback server");
    (server, rx)
}

#[tokio::test]
async fn test_delivery_end_to_end() {
    let (server, mut rx) = start((51000, 51100)).await;
    server.router().register("Sonos_1").await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("{}/webhook", server.base_url()))
        .header("X-Sonos-Household-Id", "Sonos_1")
        .header("X-Sonos-Target-Value", "RINCON_1:7")
        .header("X-Sonos-Namespace", "playback")
        .header("X-Sonos-Type", "playbackStatus")
        .json(&json!({ "playbackState": "PLAYBACK_STATE_PAUSED" }))
        .send()
        .await
        .expect("Failed to send HTTP request");

    assert_eq!(response.status(), 200);

    let delivery = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("Timeout waiting for delivery")
        .expect("No delivery received");

    assert_eq!(delivery.household_id, "Sonos_1");
    assert_eq!(delivery.target_value, "RINCON_1:7");
    assert_eq!(delivery.namespace.as_deref(), Some("playback"));
    assert_eq!(delivery.event_type.as_deref(), Some("playbackStatus"));
    assert_eq!(delivery.body["playbackState"], "PLAYBACK_STATE_PAUSED");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_missing_headers_are_rejected() {
    let (server, mut rx) = start((51100, 51200)).await;
    server.router().register("Sonos_1").await;
    let client = reqwest::Client::new();

    let no_target = client
        .post(server.base_url())
        .header("X-Sonos-Household-Id", "Sonos_1")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(no_target.status(), 400);

    let no_household = client
        .post(server.base_url())
        .header("X-Sonos-Target-Value", "RINCON_1")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(no_household.status(), 400);

    assert!(rx.try_recv().is_err());
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_json_is_rejected() {
    let (server, mut rx) = start((51200, 51300)).await;
    server.router().register("Sonos_1").await;

    let response = reqwest::Client::new()
        .post(server.base_url())
        .header("X-Sonos-Household-Id", "Sonos_1")
        .header("X-Sonos-Target-Value", "RINCON_1")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    assert!(rx.try_recv().is_err());
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unregistered_household_is_not_found() {
    let (server, mut rx) = start((51300, 51400)).await;
    server.router().register("Sonos_1").await;

    let response = reqwest::Client::new()
        .post(server.base_url())
        .header("X-Sonos-Household-Id", "Sonos_2")
        .header("X-Sonos-Target-Value", "RINCON_1")
        .json(&json!({ "volume": 10 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    assert!(rx.try_recv().is_err());
    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replaced_household_set_takes_effect() {
    let (server, mut rx) = start((51400, 51500)).await;
    server.router().register("Sonos_1").await;
    server.router().replace(["Sonos_2"]).await;
    let client = reqwest::Client::new();

    let old = client
        .post(server.base_url())
        .header("X-Sonos-Household-Id", "Sonos_1")
        .header("X-Sonos-Target-Value", "RINCON_1")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status(), 404);

    let new = client
        .post(server.base_url())
        .header("X-Sonos-Household-Id", "Sonos_2")
        .header("X-Sonos-Target-Value", "RINCON_1")
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(new.status(), 200);

    let delivery = timeout(Duration::from_secs(1), rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivery.household_id, "Sonos_2");
    server.shutdown().await.unwrap();
}
