//! Boot sequencing.
//!
//! # Responsibilities
//! - Drive prober → migration runner → server launcher strictly in order
//! - Hold and publish the BootState
//! - Tag every failure with its stage and stop
//!
//! # Design Decisions
//! - Fail fast: any stage error is fatal, nothing is retried here
//! - Boot connections are closed before the server starts
//! - Listener binds last (traffic only when ready)

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::BootConfig;
use crate::dependency::{DependencyProber, ProbeError, SchemaStore};
use crate::error::BootError;
use crate::http::{Readiness, ServerLauncher};
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::state::{BootState, Stage};
use crate::migration::{MigrationCatalog, MigrationOutcome, MigrationRunner};
use crate::observability::metrics;

/// Runs the boot sequence for one process.
pub struct BootSequencer {
    boot_id: Uuid,
    config: BootConfig,
    store: Arc<dyn SchemaStore>,
    catalog: MigrationCatalog,
    shutdown: Shutdown,
    readiness: Readiness,
    state: watch::Sender<BootState>,
    routes: Router,
}

impl BootSequencer {
    pub fn new(config: BootConfig, store: Arc<dyn SchemaStore>, shutdown: Shutdown) -> Self {
        let (state, _) = watch::channel(BootState::default());
        Self {
            boot_id: Uuid::new_v4(),
            config,
            store,
            catalog: MigrationCatalog::embedded(),
            shutdown,
            readiness: Readiness::new(),
            state,
            routes: Router::new(),
        }
    }

    /// Replace the embedded migration catalog.
    pub fn with_catalog(mut self, catalog: MigrationCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Application routes to serve once ready.
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    pub fn boot_id(&self) -> Uuid {
        self.boot_id
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<BootState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> BootState {
        self.state.borrow().clone()
    }

    /// Wait for the dependency and migrate it, then release boot connections.
    pub async fn prepare(&mut self) -> Result<MigrationOutcome, BootError> {
        let span = tracing::info_span!("boot", boot_id = %self.boot_id);
        async {
            let result = self.prepare_stages().await;
            self.store.close().await;
            tracing::debug!("Boot connections released");
            result
        }
        .instrument(span)
        .await
    }

    /// Run the full sequence and serve until shutdown.
    pub async fn run(mut self) -> Result<(), BootError> {
        self.prepare().await?;

        let span = tracing::info_span!("boot", boot_id = %self.boot_id);
        self.launch().instrument(span).await
    }

    async fn prepare_stages(&mut self) -> Result<MigrationOutcome, BootError> {
        tracing::info!(
            database = %self.config.database.redacted_url(),
            target = %self.config.migration.target,
            "Boot sequence starting"
        );
        metrics::record_state(&self.state());

        let started = Instant::now();
        let mut signal = self.shutdown.subscribe();
        let probe = DependencyProber::new(self.store.as_ref(), &self.config.probe)
            .await_dependency(&mut signal)
            .await;
        metrics::record_stage_duration(Stage::Dependency, started.elapsed());

        match probe {
            Ok(_) => {}
            Err(ProbeError::Interrupted { .. }) => {
                return Err(self.fail(Stage::Dependency, BootError::Interrupted {
                    stage: Stage::Dependency,
                }));
            }
            Err(e) => return Err(self.fail(Stage::Dependency, BootError::DependencyTimeout(e))),
        }

        self.advance(BootState::MigratingSchema);

        let started = Instant::now();
        let result = MigrationRunner::new(
            self.store.as_ref(),
            &self.catalog,
            self.config.database.lock_key,
            self.shutdown.subscribe(),
        )
        .apply_migrations(self.config.migration.target)
        .await;
        metrics::record_stage_duration(Stage::Migration, started.elapsed());

        match result {
            Ok(outcome) => {
                match outcome {
                    MigrationOutcome::UpToDate { version } => {
                        tracing::info!(version = %version, "No migrations needed");
                    }
                    MigrationOutcome::Applied { from, to } => {
                        tracing::info!(from = %from, to = %to, "Migrations applied");
                    }
                }
                Ok(outcome)
            }
            Err(e) if e.is_interrupted() => Err(self.fail(
                Stage::Migration,
                BootError::Interrupted {
                    stage: Stage::Migration,
                },
            )),
            Err(e) => Err(self.fail(Stage::Migration, BootError::Migration(e))),
        }
    }

    async fn launch(&mut self) -> Result<(), BootError> {
        if self.shutdown.is_triggered() {
            return Err(self.fail(Stage::Server, BootError::Interrupted {
                stage: Stage::Server,
            }));
        }

        let launcher = ServerLauncher::new(self.config.server.clone(), self.readiness.clone())
            .with_routes(self.routes.clone());

        let listener = match launcher.bind().await {
            Ok(listener) => listener,
            Err(e) => return Err(self.fail(Stage::Server, BootError::Server(e))),
        };

        self.advance(BootState::Serving);

        match launcher.serve_on(listener, self.shutdown.subscribe()).await {
            Ok(()) => {
                tracing::info!("Shutdown complete");
                Ok(())
            }
            Err(e) => Err(self.fail(Stage::Server, BootError::Server(e))),
        }
    }

    fn advance(&self, next: BootState) {
        self.state.send_modify(|current| {
            if current.can_transition_to(&next) {
                tracing::info!(from = %current, to = %next, "Boot state transition");
                *current = next;
            } else {
                tracing::error!(from = %current, to = %next, "Rejected invalid boot state transition");
            }
        });
        metrics::record_state(&self.state());
    }

    fn fail(&self, stage: Stage, error: BootError) -> BootError {
        tracing::error!(stage = %stage, error = %error, exit_code = error.exit_code(), "Boot failed");
        self.advance(BootState::Failed {
            stage,
            reason: error.to_string(),
        });
        error
    }
}
