//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval > 0, pool size > 0)
//! - Check the migration target against the embedded catalog
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BootConfig → Result<(), Vec<ValidationError>>
//! - Runs before any boot stage starts

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::BootConfig;
use crate::migration::{MigrationCatalog, MigrationTarget};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("database.url is required")]
    MissingDatabaseUrl,

    #[error("database.url is not a valid URL: {0}")]
    InvalidDatabaseUrl(String),

    #[error("database.url scheme '{0}' is not supported (expected postgres, postgresql or memory)")]
    UnsupportedScheme(String),

    #[error("database.max_connections must be greater than zero")]
    ZeroPoolSize,

    #[error("probe.interval_ms must be greater than zero")]
    ZeroInterval,

    #[error("probe.attempt_timeout_ms must be greater than zero")]
    ZeroAttemptTimeout,

    #[error("migration.target {target} is beyond the latest known version {head}")]
    UnknownTarget { target: u32, head: u32 },

    #[error("server.bind_address '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.log_format '{0}' is not one of pretty, json")]
    UnknownLogFormat(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a configuration against the embedded migration catalog.
pub fn validate_config(config: &BootConfig) -> Result<(), Vec<ValidationError>> {
    validate_with_catalog(config, &MigrationCatalog::embedded())
}

/// Validate a configuration against an explicit migration catalog.
pub fn validate_with_catalog(
    config: &BootConfig,
    catalog: &MigrationCatalog,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let url = config.database.url.trim();
    if url.is_empty() {
        errors.push(ValidationError::MissingDatabaseUrl);
    } else {
        match url::Url::parse(url) {
            Ok(parsed) => match parsed.scheme() {
                "postgres" | "postgresql" | "memory" => {}
                other => errors.push(ValidationError::UnsupportedScheme(other.to_string())),
            },
            Err(e) => errors.push(ValidationError::InvalidDatabaseUrl(e.to_string())),
        }
    }

    if config.database.max_connections == 0 {
        errors.push(ValidationError::ZeroPoolSize);
    }

    if config.probe.interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval);
    }
    if config.probe.attempt_timeout_ms == 0 {
        errors.push(ValidationError::ZeroAttemptTimeout);
    }

    if let MigrationTarget::Version(target) = config.migration.target {
        let head = catalog.head().get();
        if target.get() > head {
            errors.push(ValidationError::UnknownTarget {
                target: target.get(),
                head,
            });
        }
    }

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.server.bind_address.clone(),
        ));
    }

    let obs = &config.observability;
    if !matches!(obs.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::UnknownLogFormat(obs.log_format.clone()));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(
            obs.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
