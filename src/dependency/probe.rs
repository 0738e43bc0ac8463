//! Dependency readiness polling.
//!
//! # Responsibilities
//! - Probe the dependency at a fixed interval, starting immediately
//! - Bound every attempt with its own timeout
//! - Give up once the overall deadline has elapsed
//!
//! # Design Decisions
//! - All non-healthy results are retried identically; only the latest reason is kept
//! - A zero deadline fails without probing
//! - Uses Tokio's clock so the loop can be driven by a paused runtime

use std::time::Duration;

use thiserror::Error;
use tokio::time::{self, Instant};

use crate::config::ProbeConfig;
use crate::dependency::store::{ProbeResult, SchemaStore};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;

/// Proof that the dependency answered healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Healthy {
    /// Probe attempts issued, including the healthy one.
    pub attempts: u32,
    /// Time from the first attempt to the healthy answer.
    pub elapsed: Duration,
}

/// Error type for the dependency wait.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(
        "dependency not healthy after {attempts} attempt(s) in {elapsed:?}: {}",
        .last_reason.as_deref().unwrap_or("no probe attempted")
    )]
    Timeout {
        attempts: u32,
        elapsed: Duration,
        last_reason: Option<String>,
    },

    #[error("dependency wait interrupted by shutdown after {attempts} attempt(s)")]
    Interrupted { attempts: u32 },
}

/// Polls a [`SchemaStore`] until it reports healthy or the deadline passes.
pub struct DependencyProber<'a> {
    store: &'a dyn SchemaStore,
    interval: Duration,
    attempt_timeout: Duration,
    deadline: Duration,
}

impl<'a> DependencyProber<'a> {
    pub fn new(store: &'a dyn SchemaStore, config: &ProbeConfig) -> Self {
        Self::with_timing(
            store,
            config.interval(),
            config.attempt_timeout(),
            config.deadline(),
        )
    }

    pub fn with_timing(
        store: &'a dyn SchemaStore,
        interval: Duration,
        attempt_timeout: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            store,
            interval,
            attempt_timeout,
            deadline,
        }
    }

    /// Block until the dependency is healthy.
    pub async fn await_dependency(
        &self,
        shutdown: &mut ShutdownSignal,
    ) -> Result<Healthy, ProbeError> {
        let start = Instant::now();

        if self.deadline.is_zero() {
            tracing::error!("Startup deadline is not positive; not probing dependency");
            return Err(ProbeError::Timeout {
                attempts: 0,
                elapsed: Duration::ZERO,
                last_reason: None,
            });
        }

        tracing::info!(
            interval = ?self.interval,
            attempt_timeout = ?self.attempt_timeout,
            deadline = ?self.deadline,
            "Waiting for dependency"
        );

        let mut attempts = 0u32;

        loop {
            if shutdown.is_triggered() {
                return Err(ProbeError::Interrupted { attempts });
            }

            attempts += 1;
            tracing::debug!(attempt = attempts, "Probing dependency");

            let result = tokio::select! {
                r = time::timeout(self.attempt_timeout, self.store.probe()) => match r {
                    Ok(result) => result,
                    Err(_) => ProbeResult::Unreachable(format!(
                        "probe attempt timed out after {:?}",
                        self.attempt_timeout
                    )),
                },
                _ = shutdown.recv() => return Err(ProbeError::Interrupted { attempts }),
            };

            metrics::record_probe(&result);

            if result.is_healthy() {
                let elapsed = start.elapsed();
                tracing::info!(attempts, elapsed = ?elapsed, "Dependency is healthy");
                return Ok(Healthy { attempts, elapsed });
            }

            tracing::warn!(attempt = attempts, result = %result, "Dependency not ready");
            let last_reason = result.reason().map(str::to_owned);

            let elapsed = start.elapsed();
            if elapsed >= self.deadline {
                return Err(ProbeError::Timeout {
                    attempts,
                    elapsed,
                    last_reason,
                });
            }

            let wait = self.interval.min(self.deadline - elapsed);
            tokio::select! {
                _ = time::sleep(wait) => {}
                _ = shutdown.recv() => return Err(ProbeError::Interrupted { attempts }),
            }

            let elapsed = start.elapsed();
            if elapsed >= self.deadline {
                return Err(ProbeError::Timeout {
                    attempts,
                    elapsed,
                    last_reason,
                });
            }
        }
    }
}
