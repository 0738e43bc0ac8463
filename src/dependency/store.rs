//! Capability interface to the upstream dependency.
//!
//! The boot sequence needs a cheap readiness probe plus, while holding a
//! dependency-scoped migration lock, reading and advancing the recorded
//! schema version.

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::migration::{MigrationStep, SchemaVersion};

/// Outcome of one health check attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeResult {
    /// The dependency accepts connections and answers queries.
    Healthy,
    /// The dependency answered but refused to serve (e.g. still starting up).
    Unhealthy(String),
    /// The dependency could not be reached at all.
    Unreachable(String),
}

impl ProbeResult {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeResult::Healthy)
    }

    /// Failure reason, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            ProbeResult::Healthy => None,
            ProbeResult::Unhealthy(reason) | ProbeResult::Unreachable(reason) => Some(reason),
        }
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ProbeResult::Healthy => "healthy",
            ProbeResult::Unhealthy(_) => "unhealthy",
            ProbeResult::Unreachable(_) => "unreachable",
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{}: {}", self.label(), reason),
            None => f.write_str(self.label()),
        }
    }
}

/// Errors raised by a store while locked.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error("Store closed")]
    Closed,
}

/// A dependency that can be probed and migrated.
#[async_trait]
pub trait SchemaStore: Send + Sync {
    /// Issue one lightweight readiness check.
    async fn probe(&self) -> ProbeResult;

    /// Acquire the dependency-scoped migration lock, waiting while another
    /// holder owns it.
    async fn lock(&self, key: i64) -> Result<Box<dyn SchemaLock>, StoreError>;

    /// Release every connection held by this store.
    async fn close(&self);
}

/// Exclusive access to the schema version, valid while held.
///
/// Dropping the lock without calling [`SchemaLock::release`] must still free
/// it on the dependency side.
#[async_trait]
pub trait SchemaLock: Send {
    /// Currently recorded schema version (0 for an empty schema).
    async fn current_version(&mut self) -> Result<SchemaVersion, StoreError>;

    /// Apply one step and record its version atomically.
    async fn apply_step(&mut self, step: &MigrationStep) -> Result<(), StoreError>;

    /// Release the lock.
    async fn release(self: Box<Self>) -> Result<(), StoreError>;
}
