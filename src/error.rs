//! Process-level error taxonomy.
//!
//! Every boot failure maps to exactly one exit code so a process manager can
//! pick a restart policy per stage.

use thiserror::Error;

use crate::config::ConfigError;
use crate::dependency::ProbeError;
use crate::http::ServerError;
use crate::lifecycle::state::Stage;
use crate::migration::MigrationError;

/// EX_CONFIG: configuration missing or invalid.
pub const EXIT_CONFIG: u8 = 78;
/// EX_UNAVAILABLE: dependency not healthy before the deadline.
pub const EXIT_DEPENDENCY: u8 = 69;
/// EX_DATAERR: migration failed; needs an operator.
pub const EXIT_MIGRATION: u8 = 65;
/// EX_OSERR: listener could not be bound or the server died.
pub const EXIT_SERVER: u8 = 71;
/// Shutdown requested before the server started.
pub const EXIT_INTERRUPTED: u8 = 130;

/// A fatal boot error.
#[derive(Debug, Error)]
pub enum BootError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("dependency stage failed: {0}")]
    DependencyTimeout(#[source] ProbeError),

    #[error("migration stage failed: {0}")]
    Migration(#[source] MigrationError),

    #[error("server stage failed: {0}")]
    Server(#[source] ServerError),

    #[error("boot interrupted by shutdown during {stage} stage")]
    Interrupted { stage: Stage },
}

impl BootError {
    /// Stage the error belongs to; `None` for pre-boot configuration errors.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            BootError::Config(_) => None,
            BootError::DependencyTimeout(_) => Some(Stage::Dependency),
            BootError::Migration(_) => Some(Stage::Migration),
            BootError::Server(_) => Some(Stage::Server),
            BootError::Interrupted { stage } => Some(*stage),
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            BootError::Config(_) => EXIT_CONFIG,
            BootError::DependencyTimeout(_) => EXIT_DEPENDENCY,
            BootError::Migration(_) => EXIT_MIGRATION,
            BootError::Server(_) => EXIT_SERVER,
            BootError::Interrupted { .. } => EXIT_INTERRUPTED,
        }
    }
}
