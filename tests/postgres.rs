//! Tests against a live PostgreSQL instance.
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`.

use std::time::Duration;

use bootgate::config::DatabaseConfig;
use bootgate::dependency::{PostgresStore, SchemaStore};
use bootgate::lifecycle::Shutdown;
use bootgate::migration::{MigrationCatalog, MigrationOutcome, MigrationRunner, MigrationTarget};

fn live_store() -> PostgresStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let config = DatabaseConfig {
        url,
        max_connections: 4,
        ..DatabaseConfig::default()
    };
    PostgresStore::connect_lazy(&config, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_probe_live_database() {
    let store = live_store();
    assert!(store.probe().await.is_healthy());
    store.close().await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_concurrent_runs_reach_head_once() {
    let store = live_store();
    let catalog = MigrationCatalog::embedded();
    let shutdown = Shutdown::new();
    let key = DatabaseConfig::default().lock_key;

    let mut first = MigrationRunner::new(&store, &catalog, key, shutdown.subscribe());
    let mut second = MigrationRunner::new(&store, &catalog, key, shutdown.subscribe());
    let (a, b) = tokio::join!(
        first.apply_migrations(MigrationTarget::Head),
        second.apply_migrations(MigrationTarget::Head),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    let applied = [&a, &b]
        .iter()
        .filter(|o| matches!(o, MigrationOutcome::Applied { .. }))
        .count();
    assert!(applied <= 1, "steps applied twice: {a:?} {b:?}");

    let outcome = MigrationRunner::new(&store, &catalog, key, shutdown.subscribe())
        .apply_migrations(MigrationTarget::Head)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        MigrationOutcome::UpToDate {
            version: catalog.head()
        }
    );

    let mut lock = store.lock(key).await.unwrap();
    assert_eq!(lock.current_version().await.unwrap(), catalog.head());
    lock.release().await.unwrap();
    store.close().await;
}
