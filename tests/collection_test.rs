//! Synchronized collection behavior against an in-memory gateway.

mod common;

use std::time::Duration;

use bandbrain::collection::CollectionOptions;
use bandbrain::local_db::queue::{OperationKind, OperationPayload};
use bandbrain::remote::{OrderBy, RemoteGateway};
use bandbrain::shared::models::{Task, TaskPatch};
use common::{new_task, TestEnv};
use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

fn band_options() -> CollectionOptions {
    CollectionOptions::default()
        .band("band-1")
        .operation_timeout(Duration::from_secs(2))
}

#[tokio::test]
async fn online_add_writes_through_to_cache_and_remote() {
    let env = TestEnv::online().await;
    let tasks = env.collection::<Task>(band_options());

    let task = tasks.add(new_task("band-1", "Book studio time")).await.unwrap();

    // Remote received the insert, cache mirrors it, nothing was queued.
    assert_eq!(env.gateway.calls("insert"), 1);
    let cached = env.local.get("tasks", &task.id).await.unwrap().unwrap();
    assert_eq!(cached["title"], json!("Book studio time"));
    assert_eq!(env.local.pending_count().await.unwrap(), 0);

    // A refresh from the remote store produces the same record: no drift
    // after a single successful round-trip.
    tasks.refresh().await.unwrap();
    assert_eq!(tasks.data(), vec![task]);
}

#[tokio::test]
async fn offline_add_caches_and_queues_one_insert() {
    let env = TestEnv::offline().await;
    let tasks = env.collection::<Task>(band_options());

    let task = tasks.add(new_task("band-1", "X")).await.unwrap();

    // The record is immediately addressable with a real generated id.
    Uuid::parse_str(&task.id).expect("generated id is a uuid");
    let listed = tasks.data();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].title, "X");

    // Exactly one insert pending, nothing hit the gateway.
    let ops = env.local.pending_operations().await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OperationKind::Insert);
    assert_eq!(ops[0].table, "tasks");
    assert!(env.gateway.call_log().is_empty());
}

#[tokio::test]
async fn failed_online_add_degrades_to_offline_path() {
    let env = TestEnv::online().await;
    env.gateway.set_failing("tasks", true);
    let tasks = env.collection::<Task>(band_options());

    let task = tasks.add(new_task("band-1", "Design merch")).await.unwrap();

    // The caller sees a normal record; the failure shows up as a queued
    // insert plus the cached copy.
    assert_eq!(tasks.data().len(), 1);
    assert!(env.local.get("tasks", &task.id).await.unwrap().is_some());
    let ops = env.local.pending_operations().await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OperationKind::Insert);
}

#[tokio::test]
async fn update_failure_queues_full_merged_record() {
    let env = TestEnv::online().await;
    let tasks = env.collection::<Task>(band_options());
    let task = tasks.add(new_task("band-1", "Book studio time")).await.unwrap();

    env.gateway.set_failing("tasks", true);
    tasks.update(&task.id, TaskPatch::completed(true)).await.unwrap();

    // Cache and view both hold the merged record.
    let cached = env.local.get("tasks", &task.id).await.unwrap().unwrap();
    assert_eq!(cached["completed"], json!(true));
    assert_eq!(cached["title"], json!("Book studio time"));
    assert!(tasks.data()[0].completed);

    // The queued update carries the full merged record, not the patch.
    let ops = env.local.pending_operations().await.unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OperationKind::Update);
    match &ops[0].payload {
        OperationPayload::Record(record) => {
            assert_eq!(record["id"], json!(task.id));
            assert_eq!(record["title"], json!("Book studio time"));
            assert_eq!(record["completed"], json!(true));
        }
        other => panic!("expected record payload, got {other:?}"),
    }
}

#[tokio::test]
async fn online_update_merges_cache_without_queueing() {
    let env = TestEnv::online().await;
    let tasks = env.collection::<Task>(band_options());
    let task = tasks.add(new_task("band-1", "Rehearse")).await.unwrap();

    tasks.update(&task.id, TaskPatch::completed(true)).await.unwrap();

    assert_eq!(env.local.pending_count().await.unwrap(), 0);
    let cached = env.local.get("tasks", &task.id).await.unwrap().unwrap();
    assert_eq!(cached["completed"], json!(true));
    assert_eq!(env.gateway.table("tasks").await[0]["completed"], json!(true));
}

#[tokio::test]
async fn update_of_unknown_record_is_a_quiet_noop() {
    let env = TestEnv::offline().await;
    let tasks = env.collection::<Task>(band_options());

    tasks.update("missing", TaskPatch::completed(true)).await.unwrap();
    assert_eq!(env.local.pending_count().await.unwrap(), 0);
    assert!(tasks.data().is_empty());
}

#[tokio::test]
async fn offline_remove_queues_bare_id() {
    let env = TestEnv::offline().await;
    let tasks = env.collection::<Task>(band_options());
    let task = tasks.add(new_task("band-1", "Cancel gig")).await.unwrap();

    tasks.remove(&task.id).await.unwrap();

    assert!(tasks.data().is_empty());
    assert!(env.local.get("tasks", &task.id).await.unwrap().is_none());

    let ops = env.local.pending_operations().await.unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[1].kind, OperationKind::Delete);
    assert_eq!(ops[1].payload, OperationPayload::Id(task.id.clone()));
}

#[tokio::test]
async fn refresh_replaces_view_with_remote_rows() {
    let env = TestEnv::online().await;
    env.gateway
        .seed(
            "tasks",
            vec![
                json!({
                    "id": "t-remote",
                    "band_id": "band-1",
                    "title": "From remote",
                    "assignee": "",
                    "completed": false,
                    "created_at": "2025-04-01T00:00:00Z"
                }),
                json!({
                    "id": "t-other-band",
                    "band_id": "band-2",
                    "title": "Not ours",
                    "assignee": "",
                    "completed": false,
                    "created_at": "2025-04-01T00:00:00Z"
                }),
            ],
        )
        .await;

    let tasks = env.collection::<Task>(band_options());
    tasks.refresh().await.unwrap();

    let data = tasks.data();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].id, "t-remote");
    assert!(tasks.error().is_none());
    assert!(!tasks.is_loading());

    // Write-through: the remote row landed in the cache.
    assert!(env.local.get("tasks", "t-remote").await.unwrap().is_some());
}

#[tokio::test]
async fn refresh_drops_malformed_remote_rows() {
    let env = TestEnv::online().await;
    env.gateway
        .seed(
            "tasks",
            vec![
                json!({"id": "bad", "band_id": "band-1", "nope": true}),
                json!({
                    "id": "good",
                    "band_id": "band-1",
                    "title": "Valid",
                    "assignee": "",
                    "completed": false,
                    "created_at": "2025-04-01T00:00:00Z"
                }),
            ],
        )
        .await;

    let tasks = env.collection::<Task>(band_options());
    tasks.refresh().await.unwrap();

    assert_eq!(tasks.data().len(), 1);
    // The malformed row never reached the cache.
    assert!(env.local.get("tasks", "bad").await.unwrap().is_none());
}

#[tokio::test]
async fn refresh_falls_back_to_cache_when_remote_fails() {
    let env = TestEnv::offline().await;
    let tasks = env.collection::<Task>(band_options());
    tasks.add(new_task("band-1", "Cached while offline")).await.unwrap();

    // Monitor says online, but the store is unreachable: the advisory
    // reading must not lose the cached data.
    env.connectivity.set_online(true);
    env.gateway.set_reachable(false);
    tasks.refresh().await.unwrap();

    let data = tasks.data();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].title, "Cached while offline");
    assert!(tasks.error().is_none());
}

#[tokio::test]
async fn offline_refresh_applies_filters_and_stable_sort() {
    let env = TestEnv::offline().await;
    for (id, band, date) in [
        ("e1", "band-1", "2025-04-18"),
        ("e2", "band-2", "2025-04-01"),
        ("e3", "band-1", "2025-04-05"),
        ("e4", "band-1", "2025-04-05"),
    ] {
        env.local
            .save(
                "events",
                &json!({
                    "id": id,
                    "band_id": band,
                    "title": id,
                    "date": date,
                    "location": "",
                    "type": "gig",
                    "created_at": "2025-04-01T00:00:00Z"
                }),
            )
            .await
            .unwrap();
    }

    let events = env.collection::<bandbrain::shared::models::Event>(
        CollectionOptions::default()
            .band("band-1")
            .order(OrderBy::ascending("date")),
    );
    events.refresh().await.unwrap();

    let data = events.data();
    let ids: Vec<&str> = data.iter().map(|e| e.id.as_str()).collect();
    // band-2 is filtered out; e3/e4 tie on date and keep storage order.
    assert_eq!(ids, vec!["e3", "e4", "e1"]);
}

#[tokio::test]
async fn realtime_notice_triggers_refresh() {
    let env = TestEnv::online().await;
    let tasks = env.collection::<Task>(band_options());
    tasks.start_realtime();
    tasks.refresh().await.unwrap();
    assert!(tasks.data().is_empty());

    // Another client inserts a row; the change feed should pull it in.
    env.gateway
        .insert(
            "tasks",
            &json!({
                "id": "from-elsewhere",
                "band_id": "band-1",
                "title": "Pushed",
                "assignee": "",
                "completed": false,
                "created_at": "2025-04-01T00:00:00Z"
            }),
        )
        .await
        .unwrap();

    let mut found = false;
    for _ in 0..50 {
        if tasks.data().iter().any(|t| t.id == "from-elsewhere") {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(found, "change notice did not refresh the view");
}
