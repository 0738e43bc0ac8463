//! Schema migration subsystem.
//!
//! # Data Flow
//! ```text
//! MigrationTarget ("head" | N)
//!     → catalog.rs (resolve against embedded steps)
//!     → runner.rs (lock → read version → apply pending → release)
//!     → MigrationOutcome | MigrationError
//! ```
//!
//! # Design Decisions
//! - Steps are embedded SQL, numbered 1..=head without gaps
//! - Each step commits together with its version record
//! - Exactly-once under concurrent boots comes from the dependency-side lock

pub mod catalog;
pub mod runner;

pub use catalog::{MigrationCatalog, MigrationStep, MigrationTarget, SchemaVersion};
pub use runner::{MigrationError, MigrationFailure, MigrationOutcome, MigrationRunner};
