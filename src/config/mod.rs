//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, DATABASE_URL override)
//!     → validation.rs (semantic checks)
//!     → BootConfig (validated, immutable)
//!     → owned by the sequencer for the whole boot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any validation failure stops the process before the first stage

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::BootConfig;
pub use schema::DatabaseConfig;
pub use schema::MigrationConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProbeConfig;
pub use schema::ServerConfig;
pub use validation::ValidationError;
