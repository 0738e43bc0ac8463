//! End-to-end boot sequence scenarios.

use std::time::Duration;

use bootgate::error::{EXIT_DEPENDENCY, EXIT_INTERRUPTED, EXIT_MIGRATION, EXIT_SERVER};
use bootgate::lifecycle::Stage;
use bootgate::migration::{MigrationFailure, SchemaVersion};
use bootgate::{BootError, BootState};

mod common;

use common::{finish, spawn_run, test_config, Harness, INTERVAL_MS};

#[tokio::test]
async fn test_healthy_and_current_goes_straight_to_serving() {
    let harness = Harness::new(
        bootgate::dependency::MemoryStore::new().at_version(2),
        test_config(2_000),
    );
    let readiness = harness.sequencer.readiness();
    let state = harness.sequencer.subscribe_state();
    let handle = spawn_run(harness.sequencer);

    tokio::time::timeout(Duration::from_secs(5), readiness.wait_ready())
        .await
        .expect("instance never became ready");

    assert_eq!(*state.borrow(), BootState::Serving);
    assert_eq!(harness.store.probe_count(), 1);
    assert_eq!(harness.store.mutation_count(), 0);
    assert!(harness.store.is_closed(), "boot connections must be released before serving");

    let addr = readiness.local_addr().unwrap();
    let res = reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
        .get(format!("http://{addr}/health/ready"))
        .send()
        .await
        .expect("server unreachable");
    assert_eq!(res.status(), 200);

    harness.shutdown.trigger();
    finish(handle).await.unwrap();
    assert!(!readiness.is_ready());
}

#[tokio::test]
async fn test_slow_dependency_and_pending_migrations() {
    let harness = Harness::new(
        bootgate::dependency::MemoryStore::new().unhealthy_for(3),
        test_config(2_000),
    );
    let readiness = harness.sequencer.readiness();
    let handle = spawn_run(harness.sequencer);

    tokio::time::timeout(Duration::from_secs(5), readiness.wait_ready())
        .await
        .expect("instance never became ready");

    assert_eq!(harness.store.probe_count(), 4);
    assert_eq!(
        harness.store.applied_versions(),
        vec![SchemaVersion::new(1), SchemaVersion::new(2)]
    );

    harness.shutdown.trigger();
    finish(handle).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_dependency_never_healthy_fails_before_bind() {
    let harness = Harness::new(
        bootgate::dependency::MemoryStore::new().never_healthy(),
        test_config(3 * INTERVAL_MS as i64),
    );
    let readiness = harness.sequencer.readiness();
    let state = harness.sequencer.subscribe_state();

    let err = finish(spawn_run(harness.sequencer)).await.unwrap_err();

    assert!(matches!(err, BootError::DependencyTimeout(_)));
    assert_eq!(err.exit_code(), EXIT_DEPENDENCY);
    assert_eq!(harness.store.probe_count(), 3);
    assert_eq!(harness.store.mutation_count(), 0);
    assert!(readiness.local_addr().is_none(), "server bind must not be attempted");
    assert!(matches!(
        &*state.borrow(),
        BootState::Failed { stage: Stage::Dependency, .. }
    ));
}

#[tokio::test]
async fn test_failed_step_reports_last_good_version() {
    let harness = Harness::new(
        bootgate::dependency::MemoryStore::new().fail_step(2),
        test_config(2_000),
    );
    let readiness = harness.sequencer.readiness();
    let state = harness.sequencer.subscribe_state();

    let err = finish(spawn_run(harness.sequencer)).await.unwrap_err();

    assert_eq!(err.exit_code(), EXIT_MIGRATION);
    match err {
        BootError::Migration(e) => {
            assert_eq!(e.last_successful_version, Some(SchemaVersion::new(1)));
            assert!(matches!(e.failure, MigrationFailure::Step { .. }));
        }
        other => panic!("expected migration error, got {other:?}"),
    }
    assert_eq!(harness.store.version(), SchemaVersion::new(1));
    assert!(!harness.store.is_locked());
    assert!(readiness.local_addr().is_none(), "server bind must not be attempted");
    assert!(matches!(
        &*state.borrow(),
        BootState::Failed { stage: Stage::Migration, reason } if reason.contains("last successful version: 1")
    ));
}

#[tokio::test]
async fn test_bind_failure_is_a_server_stage_error() {
    let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let mut config = test_config(2_000);
    config.server.bind_address = taken.local_addr().unwrap().to_string();

    let harness = Harness::new(bootgate::dependency::MemoryStore::new(), config);
    let readiness = harness.sequencer.readiness();

    let err = finish(spawn_run(harness.sequencer)).await.unwrap_err();

    assert!(matches!(err, BootError::Server(_)));
    assert_eq!(err.exit_code(), EXIT_SERVER);
    assert_eq!(harness.store.version(), SchemaVersion::new(2));
    assert!(!readiness.is_ready());
}

#[tokio::test]
async fn test_shutdown_during_dependency_wait_aborts_promptly() {
    let harness = Harness::new(
        bootgate::dependency::MemoryStore::new().never_healthy(),
        test_config(60_000),
    );
    let shutdown = harness.shutdown.clone();
    let handle = spawn_run(harness.sequencer);

    tokio::time::sleep(Duration::from_millis(5 * INTERVAL_MS)).await;
    let triggered_at = tokio::time::Instant::now();
    shutdown.trigger();

    let err = finish(handle).await.unwrap_err();
    assert!(triggered_at.elapsed() < Duration::from_millis(4 * INTERVAL_MS));
    assert!(matches!(
        err,
        BootError::Interrupted {
            stage: Stage::Dependency
        }
    ));
    assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
    assert!(harness.store.is_closed());
}

#[tokio::test]
async fn test_non_positive_deadline_fails_without_probing() {
    let harness = Harness::new(bootgate::dependency::MemoryStore::new(), test_config(0));

    let err = finish(spawn_run(harness.sequencer)).await.unwrap_err();

    assert!(matches!(err, BootError::DependencyTimeout(_)));
    assert_eq!(harness.store.probe_count(), 0);
}

#[tokio::test]
async fn test_prepare_leaves_server_unstarted() {
    let mut harness = Harness::new(bootgate::dependency::MemoryStore::new(), test_config(2_000));

    let outcome = harness.sequencer.prepare().await.unwrap();

    assert_eq!(
        outcome,
        bootgate::migration::MigrationOutcome::Applied {
            from: SchemaVersion::ZERO,
            to: SchemaVersion::new(2)
        }
    );
    assert_eq!(harness.sequencer.state(), BootState::MigratingSchema);
    assert!(!harness.sequencer.readiness().is_ready());
    assert!(harness.store.is_closed());
}
