//! SonosCloud lifecycle and player commands against a scripted transport
//!
//! Time is paused; sleeping lets debounced fetches and spawned calls run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rstest::rstest;
use serde_json::json;
use sonos_api::mock::MockTransport;
use sonos_api::{ApiError, GroupId, HouseholdId, Method, PlayerId, SonosClient};
use sonos_event_manager::{RegisteredWebhook, WebhookRegistrar};
use sonos_sdk::{
    Capability, CapabilityStore, Player, PlayerInfo, RepeatMode, SdkConfig, SdkError, SonosCloud,
    NOT_IN_GROUP, OTHER_PLAYER_DIFFERENT_HOUSEHOLD, OTHER_PLAYER_NO_GROUP, PLAYER_GONE,
};
use sonos_state::CapabilityValue;

const GROUPS: &str = "/households/h1/groups";
const VOLUME: &str = "/players/p1/playerVolume";
const VOLUME_SUB: &str = "/players/p1/playerVolume/subscription";
const PLAYBACK_SUB: &str = "/households/h1/groups/g1/playback/subscription";
const MODIFY: &str = "/households/h1/groups/g1/groups/modifyGroupMembers";

fn scripted_transport() -> Arc<MockTransport> {
    let mock = Arc::new(MockTransport::new());
    mock.respond(
        Method::Get,
        GROUPS,
        json!({
            "groups": [
                { "id": "g1", "name": "Kitchen", "playerIds": ["p1"] },
                { "id": "g2", "name": "Den", "playerIds": ["p2"] }
            ],
            "players": [
                { "id": "p1", "name": "Kitchen", "capabilities": ["PLAYBACK", "CLOUD"] },
                { "id": "p2", "name": "Den", "capabilities": ["PLAYBACK", "CLOUD", "LINE_IN"] },
                { "id": "p3", "name": "Sub", "capabilities": ["PLAYBACK"] }
            ]
        }),
    );
    mock.respond(Method::Get, VOLUME, json!({ "volume": 42, "muted": true }));
    mock
}

fn config() -> SdkConfig {
    SdkConfig {
        volume_sync_interval_secs: 60,
        ..SdkConfig::default()
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("sonos_sdk=debug,sonos_event_manager=debug")
        .try_init();
}

async fn cloud(mock: &Arc<MockTransport>) -> SonosCloud {
    init_tracing();
    SonosCloud::builder()
        .with_config(config())
        .with_client(SonosClient::new(mock.clone()))
        .build()
        .await
        .unwrap()
}

fn add(cloud: &SonosCloud, player: &str, household: &str) -> (Player, Arc<CapabilityStore>) {
    let store = Arc::new(CapabilityStore::new());
    let player = cloud.add_player(PlayerInfo::new(player, household, player), store.clone());
    (player, store)
}

async fn settle() {
    tokio::time::sleep(Duration::from_secs(6)).await;
}

#[tokio::test(start_paused = true)]
async fn test_add_player_syncs_volume_topology_and_subscriptions() {
    let mock = scripted_transport();
    let cloud = cloud(&mock).await;
    let (player, store) = add(&cloud, "p1", "h1");
    settle().await;

    assert_eq!(mock.count(Method::Get, VOLUME), 1);
    assert_eq!(mock.count(Method::Post, VOLUME_SUB), 1);
    assert_eq!(mock.count(Method::Get, GROUPS), 1);
    assert_eq!(mock.count(Method::Post, PLAYBACK_SUB), 1);

    assert_eq!(player.group_id(), Some(GroupId::new("g1")));
    assert_eq!(store.get(Capability::VolumeSet), Some(CapabilityValue::Number(0.42)));
    assert_eq!(store.get(Capability::VolumeMute), Some(CapabilityValue::Bool(true)));
    assert_eq!(store.get(Capability::SonosGroup), Some("Kitchen".into()));

    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_volume_is_polled_on_interval() {
    let mock = scripted_transport();
    let cloud = cloud(&mock).await;
    add(&cloud, "p1", "h1");

    tokio::time::sleep(Duration::from_secs(125)).await;
    assert_eq!(mock.count(Method::Get, VOLUME), 3);

    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_remove_player_tears_down() {
    let mock = scripted_transport();
    let cloud = cloud(&mock).await;
    add(&cloud, "p1", "h1");
    settle().await;

    cloud.remove_player(&PlayerId::new("p1")).await.unwrap();
    settle().await;

    assert_eq!(mock.count(Method::Delete, VOLUME_SUB), 1);
    assert_eq!(mock.count(Method::Delete, PLAYBACK_SUB), 1);
    assert!(cloud.player(&PlayerId::new("p1")).is_none());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(mock.count(Method::Get, VOLUME), 1);

    assert!(matches!(
        cloud.remove_player(&PlayerId::new("p1")).await,
        Err(SdkError::PlayerNotFound(_))
    ));

    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_remove_player_swallows_resource_gone() {
    let mock = scripted_transport();
    mock.fail(
        Method::Delete,
        VOLUME_SUB,
        ApiError::Http {
            status: 410,
            reason: "ERROR_RESOURCE_GONE".into(),
        },
    );
    let cloud = cloud(&mock).await;
    add(&cloud, "p1", "h1");

    assert!(cloud.remove_player(&PlayerId::new("p1")).await.is_ok());
    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_group_commands_on_unbound_player_fail_before_remote_call() {
    let mock = scripted_transport();
    let cloud = cloud(&mock).await;
    let (player, _) = add(&cloud, "p9", "h1");
    settle().await;
    mock.clear();

    for result in [
        player.play().await,
        player.pause().await,
        player.next().await,
        player.set_repeat(RepeatMode::Track).await,
        player.play_line_in().await,
        player.leave_current_group().await,
        player.set_group_volume(20).await,
    ] {
        assert!(matches!(result, Err(SdkError::Validation(msg)) if msg == NOT_IN_GROUP));
    }
    assert!(mock.calls().is_empty());

    cloud.shutdown().await;
}

#[rstest]
#[case::missing_group(json!({}), "invalid")]
#[case::null_body(json!(null), "invalid")]
#[case::not_member(json!({ "group": { "id": "g1", "playerIds": ["p2"] } }), "failed")]
#[case::member(json!({ "group": { "id": "g1", "playerIds": ["p2", "p1"] } }), "ok")]
#[tokio::test(start_paused = true)]
async fn test_join_group_validates_response(
    #[case] response: serde_json::Value,
    #[case] expected: &str,
) {
    let mock = scripted_transport();
    mock.respond(Method::Post, MODIFY, response);
    let cloud = cloud(&mock).await;
    let (player, _) = add(&cloud, "p1", "h1");
    settle().await;

    let result = player.join_group(&GroupId::new("g1")).await;
    match expected {
        "invalid" => assert!(matches!(result, Err(SdkError::JoinInvalidResponse))),
        "failed" => assert!(matches!(result, Err(SdkError::JoinFailed))),
        _ => assert!(result.is_ok()),
    }

    let call = mock.last_call().unwrap();
    assert_eq!(call.body, Some(json!({ "playerIdsToAdd": ["p1"], "playerIdsToRemove": [] })));

    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_join_triggers_topology_resync() {
    let mock = scripted_transport();
    mock.respond(
        Method::Post,
        "/households/h1/groups/g2/groups/modifyGroupMembers",
        json!({ "group": { "id": "g2", "playerIds": ["p2", "p1"] } }),
    );
    let cloud = cloud(&mock).await;
    let (p1, _) = add(&cloud, "p1", "h1");
    add(&cloud, "p2", "h1");
    settle().await;
    assert_eq!(mock.count(Method::Get, GROUPS), 1);

    p1.join_player(&PlayerId::new("p2")).await.unwrap();
    settle().await;

    assert_eq!(mock.count(Method::Get, GROUPS), 2);
    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_join_player_validations() {
    let mock = scripted_transport();
    let cloud = cloud(&mock).await;
    let (p1, _) = add(&cloud, "p1", "h1");
    add(&cloud, "p9", "h1");
    add(&cloud, "p2", "h2");
    settle().await;

    let result = p1.join_player(&PlayerId::new("nobody")).await;
    assert!(matches!(result, Err(SdkError::Validation(msg)) if msg == PLAYER_GONE));

    let result = p1.join_player(&PlayerId::new("p9")).await;
    assert!(matches!(result, Err(SdkError::Validation(msg)) if msg == OTHER_PLAYER_NO_GROUP));

    // topology is routed per household; h2 needs its own listing
    mock.respond(
        Method::Get,
        "/households/h2/groups",
        json!({ "groups": [{ "id": "g5", "name": "Loft", "playerIds": ["p2"] }] }),
    );
    cloud.registry().request_topology_sync();
    settle().await;

    let result = p1.join_player(&PlayerId::new("p2")).await;
    assert!(matches!(
        result,
        Err(SdkError::Validation(msg)) if msg == OTHER_PLAYER_DIFFERENT_HOUSEHOLD
    ));

    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_command_bodies() {
    let mock = scripted_transport();
    mock.respond(
        Method::Post,
        "/households/h1/groups/g1/playbackSession",
        json!({ "sessionId": "s1" }),
    );
    let cloud = cloud(&mock).await;
    let (player, _) = add(&cloud, "p1", "h1");
    settle().await;

    player.set_volume(0.42).await.unwrap();
    assert_eq!(mock.last_call().unwrap().body, Some(json!({ "volume": 42 })));

    player.set_mute(false).await.unwrap();
    assert_eq!(mock.last_call().unwrap().body, Some(json!({ "muted": false })));

    player.set_repeat(RepeatMode::Playlist).await.unwrap();
    let call = mock.last_call().unwrap();
    assert_eq!(call.path, "/households/h1/groups/g1/playback/playMode");
    assert_eq!(
        call.body,
        Some(json!({ "playModes": { "repeat": true, "repeatOne": false } }))
    );

    player.set_shuffle(true).await.unwrap();
    assert_eq!(
        mock.last_call().unwrap().body,
        Some(json!({ "playModes": { "shuffle": true } }))
    );

    player.play_stream_url("http://radio/stream").await.unwrap();
    let call = mock.last_call().unwrap();
    assert_eq!(call.path, "/playbackSessions/s1/playbackSession/loadStreamUrl");
    assert_eq!(call.body.unwrap()["streamUrl"], "http://radio/stream");

    player.set_playing(false).await.unwrap();
    assert_eq!(
        mock.last_call().unwrap().path,
        "/households/h1/groups/g1/playback/pause"
    );

    player.seek(Duration::from_millis(90_500)).await.unwrap();
    let call = mock.last_call().unwrap();
    assert_eq!(call.path, "/households/h1/groups/g1/playback/seek");
    assert_eq!(call.body, Some(json!({ "positionMillis": 90_500 })));

    // Out-of-range positions saturate instead of wrapping
    player.seek(Duration::MAX).await.unwrap();
    assert_eq!(
        mock.last_call().unwrap().body,
        Some(json!({ "positionMillis": u64::MAX }))
    );

    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_command_errors_propagate_unmodified() {
    let mock = scripted_transport();
    mock.fail(
        Method::Post,
        "/households/h1/groups/g1/playback/play",
        ApiError::Http {
            status: 499,
            reason: "ERROR_PLAYBACK_FAILED".into(),
        },
    );
    let cloud = cloud(&mock).await;
    let (player, _) = add(&cloud, "p1", "h1");
    settle().await;

    match player.play().await {
        Err(SdkError::ApiError(e)) => assert_eq!(e.reason(), Some("ERROR_PLAYBACK_FAILED")),
        other => panic!("unexpected {:?}", other),
    }

    cloud.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_discover_players_filters_capabilities() {
    let mock = scripted_transport();
    mock.respond(
        Method::Get,
        "/households",
        json!({ "households": [{ "id": "h1" }] }),
    );
    let cloud = cloud(&mock).await;

    let players = cloud.discover_players().await.unwrap();
    let ids: Vec<_> = players.iter().map(|p| p.player_id.to_string()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    assert!(players.iter().all(|p| p.household_id == HouseholdId::new("h1")));

    cloud.shutdown().await;
}

#[derive(Default)]
struct RecordingRegistrar {
    created: Mutex<Vec<Vec<String>>>,
}

struct NoopWebhook;

#[async_trait]
impl RegisteredWebhook for NoopWebhook {
    async fn unregister(&self) -> sonos_event_manager::Result<()> {
        Ok(())
    }
}

#[async_trait]
impl WebhookRegistrar for RecordingRegistrar {
    async fn create_webhook(
        &self,
        household_ids: &[HouseholdId],
    ) -> sonos_event_manager::Result<Box<dyn RegisteredWebhook>> {
        self.created
            .lock()
            .push(household_ids.iter().map(|h| h.to_string()).collect());
        Ok(Box::new(NoopWebhook))
    }
}

#[tokio::test(start_paused = true)]
async fn test_add_player_registers_webhook_per_household() {
    let mock = scripted_transport();
    let registrar = Arc::new(RecordingRegistrar::default());
    let cloud = SonosCloud::builder()
        .with_config(config())
        .with_client(SonosClient::new(mock.clone()))
        .with_webhook_registrar(registrar.clone())
        .build()
        .await
        .unwrap();

    add(&cloud, "p1", "h1");
    settle().await;
    add(&cloud, "p2", "h1");
    settle().await;
    add(&cloud, "p3", "h2");
    settle().await;

    assert_eq!(
        *registrar.created.lock(),
        vec![vec!["h1".to_string()], vec!["h1".to_string(), "h2".to_string()]]
    );

    cloud.shutdown().await;
}

#[tokio::test]
async fn test_build_requires_client_or_tokens() {
    assert!(matches!(
        SonosCloud::builder().build().await,
        Err(SdkError::Config(_))
    ));
}
