//! Integration tests for the support queue engine
//!
//! These tests drive the engine, rule recalculation and reconciliation
//! end-to-end against the in-process queue store and an in-memory database,
//! so every flow runs without a cache or database server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::TimeZone;
use gamedesk_queue_engine::prelude::*;
use serial_test::serial;

async fn create_test_engine() -> Result<(SupportQueueEngine, Arc<InMemoryQueueStore>)> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let mut config = SupportQueueConfig::default();
    config.database.database_path = ":memory:".to_string();
    // Keep retries quick so failure-path tests stay fast.
    config.retry.base_delay = Duration::from_millis(10);
    config.retry.max_delay = Duration::from_millis(40);

    let database = Arc::new(DatabaseManager::new_in_memory().await?);
    let store = Arc::new(InMemoryQueueStore::new());
    let engine = SupportQueueEngine::new(config, database, store.clone())?;

    Ok((engine, store))
}

fn at(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

#[tokio::test]
#[serial]
async fn test_unassigned_queue_ordering_end_to_end() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");

    assert!(engine.enqueue_unassigned("S1", 50, at(100)).await);
    assert!(engine.enqueue_unassigned("S2", 50, at(50)).await);
    assert!(engine.enqueue_unassigned("S3", 90, at(200)).await);

    // Highest priority first; FIFO within the tied tier.
    let ids = engine.list_queue(None, None).await;
    assert_eq!(ids, vec!["S3", "S2", "S1"]);

    assert_eq!(engine.queue_length(None).await, 3);
    assert_eq!(engine.queue_position("S3", None).await, Some(1));
    assert_eq!(engine.queue_position("S2", None).await, Some(2));
    assert_eq!(engine.queue_position("S1", None).await, Some(3));
}

#[tokio::test]
#[serial]
async fn test_re_enqueue_overwrites_entry() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");

    assert!(engine.enqueue_unassigned("S1", 0, at(100)).await);
    assert!(engine.enqueue_unassigned("S2", 10, at(100)).await);
    assert_eq!(engine.queue_position("S1", None).await, Some(2));

    // Re-enqueueing with a higher priority moves the same entry up.
    assert!(engine.enqueue_unassigned("S1", 99, at(100)).await);
    assert_eq!(engine.queue_length(None).await, 2);
    assert_eq!(engine.queue_position("S1", None).await, Some(1));
}

#[tokio::test]
#[serial]
async fn test_dequeue_removes_session() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");

    assert!(engine.enqueue_unassigned("S1", 5, at(100)).await);
    assert_eq!(engine.queue_position("S1", None).await, Some(1));

    assert!(engine.dequeue("S1", None).await);
    assert_eq!(engine.queue_position("S1", None).await, None);
    assert_eq!(engine.queue_length(None).await, 0);
}

#[tokio::test]
#[serial]
async fn test_move_to_agent_queue() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");

    assert!(engine.enqueue_unassigned("S1", 5, at(100)).await);
    assert!(engine.move_to_agent("S1", "agent-7", 5, at(100)).await);

    assert_eq!(engine.queue_position("S1", None).await, None);
    assert_eq!(engine.queue_position("S1", Some("agent-7")).await, Some(1));
    assert_eq!(engine.queue_length(Some("agent-7")).await, 1);
}

#[tokio::test]
#[serial]
async fn test_cache_outage_policy() {
    let (engine, store) = create_test_engine().await.expect("engine creation failed");
    store.set_available(false);

    // Load-bearing insert surfaces the failure for the caller to defer.
    assert!(!engine.enqueue_unassigned("S1", 5, at(100)).await);

    // Best-effort removal is silently absorbed.
    assert!(engine.dequeue("S1", None).await);

    // Reads degrade to "no answer", never errors.
    assert_eq!(engine.queue_position("S1", None).await, None);
    assert_eq!(engine.queue_length(None).await, 0);

    // Once the cache is back, normal operation resumes.
    store.set_available(true);
    assert!(engine.enqueue_unassigned("S1", 5, at(100)).await);
    assert_eq!(engine.queue_position("S1", None).await, Some(1));
}

#[tokio::test]
#[serial]
async fn test_recalculate_queue_scores_and_positions() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");
    let db = engine.database();

    // Three waiting sessions, enqueued before any rules exist.
    for (id, queued_at) in [("s-vip", 200), ("s-crash", 100), ("s-plain", 50)] {
        db.upsert_session(id, SessionStatus::Queued, None, 0, at(queued_at))
            .await
            .unwrap();
        assert!(engine.enqueue_unassigned(id, 0, at(queued_at)).await);
    }

    db.upsert_ticket(&TicketAttributes {
        session_id: "s-vip".to_string(),
        issue_type_ids: vec![1],
        ..Default::default()
    })
    .await
    .unwrap();
    db.upsert_ticket(&TicketAttributes {
        session_id: "s-crash".to_string(),
        issue_type_ids: vec![2],
        description: Some("game crash on login".to_string()),
        ..Default::default()
    })
    .await
    .unwrap();
    db.upsert_ticket(&TicketAttributes {
        session_id: "s-plain".to_string(),
        issue_type_ids: vec![3],
        ..Default::default()
    })
    .await
    .unwrap();

    db.upsert_rule(&UrgencyRule {
        rule_id: "payment-escalation".to_string(),
        name: "Payment issues first".to_string(),
        enabled: true,
        priority_weight: 90,
        conditions: RuleConditions {
            issue_type_ids: vec![1],
            ..Default::default()
        },
    })
    .await
    .unwrap();
    db.upsert_rule(&UrgencyRule {
        rule_id: "crash-reports".to_string(),
        name: "Crash reports".to_string(),
        enabled: true,
        priority_weight: 50,
        conditions: RuleConditions {
            issue_type_ids: vec![2],
            keyword: Some("crash".to_string()),
            ..Default::default()
        },
    })
    .await
    .unwrap();

    let summary = engine.recalculate_queue().await.expect("recalculation failed");
    assert_eq!(summary.rules_evaluated, 2);
    assert_eq!(summary.sessions_scanned, 3);
    assert_eq!(summary.scores_written, 3);
    assert_eq!(summary.positions_assigned, 3);
    assert_eq!(summary.failures, 0);

    // Durable scores reflect the matching rules.
    let db = engine.database();
    assert_eq!(db.get_session("s-vip").await.unwrap().unwrap().priority_score, 90);
    assert_eq!(db.get_session("s-crash").await.unwrap().unwrap().priority_score, 50);
    assert_eq!(db.get_session("s-plain").await.unwrap().unwrap().priority_score, 0);

    // Positions are a gap-free 1..N in (score desc, queued_at asc) order.
    assert_eq!(db.get_session("s-vip").await.unwrap().unwrap().queue_position, Some(1));
    assert_eq!(db.get_session("s-crash").await.unwrap().unwrap().queue_position, Some(2));
    assert_eq!(db.get_session("s-plain").await.unwrap().unwrap().queue_position, Some(3));

    // The cache ordering was refreshed to match.
    assert_eq!(
        engine.list_queue(None, None).await,
        vec!["s-vip", "s-crash", "s-plain"]
    );
}

#[tokio::test]
#[serial]
async fn test_consistency_pass_restores_missing_sessions() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");
    let db = engine.database();

    // Durable records say these sessions are waiting; the cache lost both.
    db.upsert_session("s-lost", SessionStatus::Queued, None, 5, at(100))
        .await
        .unwrap();
    db.upsert_session("s-agent", SessionStatus::Queued, Some("agent-1"), 0, at(200))
        .await
        .unwrap();
    db.upsert_session("s-closed", SessionStatus::Closed, None, 0, at(300))
        .await
        .unwrap();

    let summary = engine.reconciler().run_consistency_pass().await;
    assert!(!summary.skipped);
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.missing, 2);
    assert_eq!(summary.repaired, 2);
    assert_eq!(summary.failures, 0);

    // Each session landed in its correct queue.
    assert_eq!(engine.queue_position("s-lost", None).await, Some(1));
    assert_eq!(engine.queue_position("s-agent", Some("agent-1")).await, Some(1));
    assert_eq!(engine.queue_position("s-closed", None).await, None);

    // A second pass finds nothing left to repair.
    let second = engine.reconciler().run_consistency_pass().await;
    assert_eq!(second.missing, 0);
}

#[tokio::test]
#[serial]
async fn test_position_sync_refreshes_durable_positions() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");
    let db = engine.database();

    db.upsert_session("S-high", SessionStatus::Queued, None, 80, at(100))
        .await
        .unwrap();
    db.upsert_session("S-low", SessionStatus::Queued, None, 10, at(100))
        .await
        .unwrap();
    assert!(engine.enqueue_unassigned("S-high", 80, at(100)).await);
    assert!(engine.enqueue_unassigned("S-low", 10, at(100)).await);

    let summary = engine.reconciler().run_position_sync().await;
    assert!(!summary.skipped);
    assert_eq!(summary.scanned, 2);
    assert_eq!(summary.updated, 2);

    assert_eq!(db.get_session("S-high").await.unwrap().unwrap().queue_position, Some(1));
    assert_eq!(db.get_session("S-low").await.unwrap().unwrap().queue_position, Some(2));

    // The position column follows the cache as it drains: a session no
    // longer present has its stale position cleared, not preserved.
    assert!(engine.dequeue("S-high", None).await);
    engine.reconciler().run_position_sync().await;
    assert_eq!(db.get_session("S-high").await.unwrap().unwrap().queue_position, None);
    assert_eq!(db.get_session("S-low").await.unwrap().unwrap().queue_position, Some(1));
}

#[tokio::test]
#[serial]
async fn test_reconciler_skips_entirely_when_cache_down() {
    let (engine, store) = create_test_engine().await.expect("engine creation failed");
    let db = engine.database();

    db.upsert_session("s1", SessionStatus::Queued, None, 0, at(100))
        .await
        .unwrap();
    store.set_available(false);

    let sync = engine.reconciler().run_position_sync().await;
    assert!(sync.skipped);
    assert_eq!(sync.scanned, 0);

    let repair = engine.reconciler().run_consistency_pass().await;
    assert!(repair.skipped);
    assert_eq!(repair.scanned, 0);
}

#[tokio::test]
#[serial]
async fn test_reconciler_tolerates_missing_session_table() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");

    // Simulate the durable store mid-migration.
    sqlx::query("DROP TABLE support_sessions")
        .execute(engine.database().pool())
        .await
        .unwrap();

    let sync = engine.reconciler().run_position_sync().await;
    assert!(!sync.skipped);
    assert_eq!(sync.scanned, 0);
    assert_eq!(sync.failures, 0);

    let repair = engine.reconciler().run_consistency_pass().await;
    assert_eq!(repair.scanned, 0);
    assert_eq!(repair.failures, 0);
}

#[tokio::test]
#[serial]
async fn test_reconciler_schedules_start_and_stop() {
    let (engine, _store) = create_test_engine().await.expect("engine creation failed");

    let handle = engine.start_reconciler();
    // Schedules are idle until their first interval elapses; shutting down
    // immediately must not disturb the engine.
    handle.shutdown();

    assert!(engine.enqueue_unassigned("S1", 1, at(100)).await);
    assert_eq!(engine.queue_position("S1", None).await, Some(1));
}
