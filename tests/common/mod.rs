//! Shared utilities for boot sequence integration tests.

use std::sync::Arc;
use std::time::Duration;

use bootgate::config::BootConfig;
use bootgate::dependency::{MemoryStore, SchemaStore};
use bootgate::{BootError, BootSequencer, Shutdown};
use tokio::task::JoinHandle;

pub const INTERVAL_MS: u64 = 20;

/// Configuration with fast probing and an ephemeral listener.
pub fn test_config(deadline_ms: i64) -> BootConfig {
    let mut config = BootConfig::default();
    config.database.url = "memory://".to_string();
    config.probe.interval_ms = INTERVAL_MS;
    config.probe.attempt_timeout_ms = 50;
    config.probe.deadline_ms = deadline_ms;
    config.server.bind_address = "127.0.0.1:0".to_string();
    config
}

/// A sequencer wired to a shared in-memory store.
pub struct Harness {
    pub store: MemoryStore,
    pub shutdown: Shutdown,
    pub sequencer: BootSequencer,
}

impl Harness {
    pub fn new(store: MemoryStore, config: BootConfig) -> Self {
        let shutdown = Shutdown::new();
        let dyn_store: Arc<dyn SchemaStore> = Arc::new(store.clone());
        let sequencer = BootSequencer::new(config, dyn_store, shutdown.clone());
        Self {
            store,
            shutdown,
            sequencer,
        }
    }
}

/// Run the full sequence in the background.
pub fn spawn_run(sequencer: BootSequencer) -> JoinHandle<Result<(), BootError>> {
    tokio::spawn(sequencer.run())
}

/// Await a boot task that is expected to finish on its own.
#[allow(dead_code)]
pub async fn finish(handle: JoinHandle<Result<(), BootError>>) -> Result<(), BootError> {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("boot sequence did not finish in time")
        .expect("boot task panicked")
}
