//! Dependency-gated bootstrap sequencer.
//!
//! Waits for a relational store to accept connections, brings its schema up
//! to the version this build expects, and only then starts serving traffic.

pub mod config;
pub mod dependency;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod migration;
pub mod observability;

pub use config::schema::BootConfig;
pub use error::BootError;
pub use lifecycle::{BootSequencer, BootState, Shutdown};
