//! In-process schema store.
//!
//! Selected by a `memory://` database URL for running without a database.
//! Its fault knobs (unhealthy probes, hung probes, failing steps, slow steps)
//! let the whole boot sequence be exercised deterministically.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::dependency::store::{ProbeResult, SchemaLock, SchemaStore, StoreError};
use crate::migration::{MigrationStep, SchemaVersion};

#[derive(Debug, Default)]
struct Faults {
    unhealthy_probes: u32,
    never_healthy: bool,
    hang_probes: bool,
    fail_step: Option<SchemaVersion>,
    step_delay: Duration,
}

#[derive(Debug)]
struct Inner {
    applied: Mutex<Vec<SchemaVersion>>,
    faults: Mutex<Faults>,
    lock: Arc<Semaphore>,
    probes: AtomicU32,
    mutations: AtomicU32,
    closed: AtomicBool,
}

/// Shared in-memory store; clones observe the same state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// An empty, immediately healthy store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                applied: Mutex::new(Vec::new()),
                faults: Mutex::new(Faults::default()),
                lock: Arc::new(Semaphore::new(1)),
                probes: AtomicU32::new(0),
                mutations: AtomicU32::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Pretend versions `1..=version` were applied by an earlier boot.
    pub fn at_version(self, version: u32) -> Self {
        *lock_unpoisoned(&self.inner.applied) = (1..=version).map(SchemaVersion::new).collect();
        self
    }

    /// Answer the first `probes` probes as unhealthy.
    pub fn unhealthy_for(self, probes: u32) -> Self {
        self.faults().unhealthy_probes = probes;
        self
    }

    pub fn never_healthy(self) -> Self {
        self.faults().never_healthy = true;
        self
    }

    /// Make every probe hang forever.
    pub fn hang_probes(self) -> Self {
        self.faults().hang_probes = true;
        self
    }

    /// Fail when applying the step with this version.
    pub fn fail_step(self, version: u32) -> Self {
        self.faults().fail_step = Some(SchemaVersion::new(version));
        self
    }

    /// Sleep this long inside each step.
    pub fn step_delay(self, delay: Duration) -> Self {
        self.faults().step_delay = delay;
        self
    }

    pub fn probe_count(&self) -> u32 {
        self.inner.probes.load(Ordering::SeqCst)
    }

    /// Number of steps applied through this store.
    pub fn mutation_count(&self) -> u32 {
        self.inner.mutations.load(Ordering::SeqCst)
    }

    /// Recorded versions, in application order.
    pub fn applied_versions(&self) -> Vec<SchemaVersion> {
        lock_unpoisoned(&self.inner.applied).clone()
    }

    pub fn version(&self) -> SchemaVersion {
        current(&lock_unpoisoned(&self.inner.applied))
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock.available_permits() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        lock_unpoisoned(&self.inner.faults)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn current(applied: &[SchemaVersion]) -> SchemaVersion {
    applied.last().copied().unwrap_or(SchemaVersion::ZERO)
}

#[async_trait]
impl SchemaStore for MemoryStore {
    async fn probe(&self) -> ProbeResult {
        let seen = self.inner.probes.fetch_add(1, Ordering::SeqCst);
        let (hang, unhealthy) = {
            let faults = self.faults();
            (
                faults.hang_probes,
                faults.never_healthy || seen < faults.unhealthy_probes,
            )
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if self.is_closed() {
            return ProbeResult::Unreachable("store closed".to_string());
        }
        if unhealthy {
            return ProbeResult::Unhealthy("database is starting up".to_string());
        }
        ProbeResult::Healthy
    }

    async fn lock(&self, _key: i64) -> Result<Box<dyn SchemaLock>, StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        let permit = self
            .inner
            .lock
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| StoreError::Lock(e.to_string()))?;

        Ok(Box::new(MemoryLock {
            store: self.clone(),
            _permit: permit,
        }))
    }

    async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }
}

/// Holds the store's single permit; dropping it frees the lock.
struct MemoryLock {
    store: MemoryStore,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl SchemaLock for MemoryLock {
    async fn current_version(&mut self) -> Result<SchemaVersion, StoreError> {
        Ok(self.store.version())
    }

    async fn apply_step(&mut self, step: &MigrationStep) -> Result<(), StoreError> {
        let (fail, delay) = {
            let faults = self.store.faults();
            (faults.fail_step == Some(step.version), faults.step_delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::Query(format!(
                "step {} ({}) rejected by store",
                step.version, step.name
            )));
        }

        let mut applied = lock_unpoisoned(&self.store.inner.applied);
        let expected = current(&applied).next();
        if step.version != expected {
            return Err(StoreError::Query(format!(
                "step {} applied out of order (expected {})",
                step.version, expected
            )));
        }
        applied.push(step.version);
        self.store.inner.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
