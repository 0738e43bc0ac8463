//! Schema migration execution.
//!
//! # Responsibilities
//! - Take the dependency-scoped migration lock
//! - Compare the recorded version with the target
//! - Apply pending steps in order, one atomic step at a time
//!
//! # Design Decisions
//! - Already at or past the target: no writes at all
//! - First failing step aborts the rest; nothing is retried here
//! - The lock is released on every exit path (drop covers cancellation)
//! - Shutdown is honoured between steps, never inside one

use thiserror::Error;

use crate::dependency::store::{SchemaLock, SchemaStore, StoreError};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::migration::catalog::{MigrationCatalog, MigrationTarget, SchemaVersion};
use crate::observability::metrics;

/// Successful result of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing to do; the recorded version is already at or past the target.
    UpToDate { version: SchemaVersion },
    /// Steps were applied.
    Applied {
        from: SchemaVersion,
        to: SchemaVersion,
    },
}

/// Why a migration run stopped.
#[derive(Debug, Error)]
pub enum MigrationFailure {
    #[error("could not acquire migration lock: {0}")]
    Lock(#[source] StoreError),

    #[error("could not read schema version: {0}")]
    ReadVersion(#[source] StoreError),

    #[error("target version {target} is beyond the latest known version {head}")]
    UnknownTarget {
        target: SchemaVersion,
        head: SchemaVersion,
    },

    #[error("step {version} ({name}) failed: {source}")]
    Step {
        version: SchemaVersion,
        name: &'static str,
        source: StoreError,
    },

    #[error("interrupted by shutdown")]
    Interrupted,
}

/// A failed migration run with the last version known to be committed.
#[derive(Debug, Error)]
#[error("{failure} (last successful version: {})", display_version(.last_successful_version))]
pub struct MigrationError {
    pub failure: MigrationFailure,
    /// `None` when the run failed before the version could be read.
    pub last_successful_version: Option<SchemaVersion>,
}

fn display_version(version: &Option<SchemaVersion>) -> String {
    version.map_or_else(|| "unknown".to_string(), |v| v.to_string())
}

impl MigrationError {
    fn new(failure: MigrationFailure, last_successful_version: Option<SchemaVersion>) -> Self {
        Self {
            failure,
            last_successful_version,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self.failure, MigrationFailure::Interrupted)
    }
}

/// Brings a [`SchemaStore`] up to a target version.
pub struct MigrationRunner<'a> {
    store: &'a dyn SchemaStore,
    catalog: &'a MigrationCatalog,
    lock_key: i64,
    shutdown: ShutdownSignal,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(
        store: &'a dyn SchemaStore,
        catalog: &'a MigrationCatalog,
        lock_key: i64,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            store,
            catalog,
            lock_key,
            shutdown,
        }
    }

    /// Apply every pending step up to `target`.
    pub async fn apply_migrations(
        &mut self,
        target: MigrationTarget,
    ) -> Result<MigrationOutcome, MigrationError> {
        let target_version = self.catalog.resolve(target).ok_or_else(|| {
            let target = match target {
                MigrationTarget::Version(v) => v,
                MigrationTarget::Head => self.catalog.head(),
            };
            MigrationError::new(
                MigrationFailure::UnknownTarget {
                    target,
                    head: self.catalog.head(),
                },
                None,
            )
        })?;

        if self.shutdown.is_triggered() {
            return Err(MigrationError::new(MigrationFailure::Interrupted, None));
        }

        tracing::debug!(lock_key = self.lock_key, "Acquiring migration lock");
        let store = self.store;
        let mut lock = tokio::select! {
            r = store.lock(self.lock_key) => r.map_err(|e| {
                MigrationError::new(MigrationFailure::Lock(e), None)
            })?,
            _ = self.shutdown.recv() => {
                return Err(MigrationError::new(MigrationFailure::Interrupted, None));
            }
        };
        tracing::debug!(lock_key = self.lock_key, "Migration lock acquired");

        let result = self.migrate_locked(lock.as_mut(), target_version).await;

        if let Err(e) = lock.release().await {
            tracing::warn!(error = %e, "Failed to release migration lock cleanly");
        }

        result
    }

    async fn migrate_locked(
        &self,
        lock: &mut dyn SchemaLock,
        target: SchemaVersion,
    ) -> Result<MigrationOutcome, MigrationError> {
        let current = lock
            .current_version()
            .await
            .map_err(|e| MigrationError::new(MigrationFailure::ReadVersion(e), None))?;

        if current >= target {
            if current > self.catalog.head() {
                tracing::warn!(
                    current = %current,
                    head = %self.catalog.head(),
                    "Recorded schema version is newer than any known migration"
                );
            }
            tracing::info!(version = %current, target = %target, "Schema is up to date");
            return Ok(MigrationOutcome::UpToDate { version: current });
        }

        let pending = self.catalog.pending(current, target);
        tracing::info!(
            from = %current,
            to = %target,
            steps = pending.len(),
            "Applying schema migrations"
        );

        let mut last = current;
        for step in pending {
            if self.shutdown.is_triggered() {
                tracing::warn!(next = %step.version, "Shutdown requested; stopping before next step");
                return Err(MigrationError::new(MigrationFailure::Interrupted, Some(last)));
            }

            tracing::info!(version = %step.version, name = step.name, "Applying migration step");
            lock.apply_step(step).await.map_err(|source| {
                tracing::error!(version = %step.version, name = step.name, error = %source, "Migration step failed");
                MigrationError::new(
                    MigrationFailure::Step {
                        version: step.version,
                        name: step.name,
                        source,
                    },
                    Some(last),
                )
            })?;

            metrics::record_migration_step();
            last = step.version;
        }

        Ok(MigrationOutcome::Applied {
            from: current,
            to: last,
        })
    }
}
