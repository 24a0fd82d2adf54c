mod common;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use multiverse_orchestrator::{spawn, OrchestratorMetrics};
use multiverse_proto::{Command, ErrorKind, EventKind};
use serde_json::json;
use tokio::sync::mpsc;

/// S3: publishing to an unknown `target_game_id` fails the command on the
/// publisher's own connection and never reaches the event log, so no other
/// subscriber sees it.
#[tokio::test]
async fn unknown_target_errors_publisher_only_and_is_not_logged() {
    let handle = spawn(common::fast_config(), Arc::new(OrchestratorMetrics::default()));

    let (tx_a, mut rx_a) = mpsc::channel(100);
    let (id_a, _) = handle
        .subscribe(tx_a, Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();
    handle
        .submit_command(id_a, common::register_game("tavern", vec!["hub"]))
        .await
        .unwrap()
        .unwrap();

    let (tx_b, mut rx_b) = mpsc::channel(100);
    let (_id_b, _) = handle
        .subscribe(tx_b, Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();

    let outcome = handle
        .submit_command(
            id_a,
            Command::PublishEvent {
                source_game_id: "tavern".into(),
                target_game_id: Some("nowhere".into()),
                event_type: "quest".into(),
                data: json!({ "id": 1 }),
            },
        )
        .await
        .unwrap();
    let err = outcome.unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownTarget);

    tokio::time::sleep(Duration::from_millis(150)).await;

    for rx in [&mut rx_a, &mut rx_b] {
        while let Ok(envelope) = rx.try_recv() {
            assert_ne!(
                envelope.event_type,
                EventKind::CrossGameEvent,
                "a rejected command must never reach the event log"
            );
        }
    }
}

/// S4: a second `register_game` for a `game_id` already active fails with
/// `DuplicateGameId`, regardless of which connection sends it.
#[tokio::test]
async fn duplicate_registration_from_different_connection_fails() {
    let handle = spawn(common::fast_config(), Arc::new(OrchestratorMetrics::default()));

    let (tx_a, _rx_a) = mpsc::channel(100);
    let (id_a, _) = handle
        .subscribe(tx_a, Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();
    handle
        .submit_command(id_a, common::register_game("tavern", vec!["hub"]))
        .await
        .unwrap()
        .unwrap();

    let (tx_b, _rx_b) = mpsc::channel(100);
    let (id_b, _) = handle
        .subscribe(tx_b, Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();
    let err = handle
        .submit_command(id_b, common::register_game("tavern", vec!["wilds"]))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::DuplicateGameId);
}

/// Property 8: inserting the same realm identity twice (same game_id,
/// immutable dimensions) is rejected rather than silently duplicated in the
/// STAT7 index.
#[tokio::test]
async fn duplicate_registration_does_not_grow_the_index() {
    let handle = spawn(common::fast_config(), Arc::new(OrchestratorMetrics::default()));

    let (tx_a, _rx_a) = mpsc::channel(100);
    let (id_a, _) = handle
        .subscribe(tx_a, Arc::new(AtomicBool::new(false)))
        .await
        .unwrap();
    handle
        .submit_command(id_a, common::register_game("tavern", vec!["hub"]))
        .await
        .unwrap()
        .unwrap();

    let before = handle.snapshot().await.unwrap();
    let _ = handle
        .submit_command(id_a, common::register_game("tavern", vec!["hub"]))
        .await
        .unwrap();
    let after = handle.snapshot().await.unwrap();
    assert_eq!(before.registered_games, after.registered_games);
}
