//! Configuration schema definitions.
//!
//! This module defines the complete boot configuration.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::migration::MigrationTarget;

/// Root configuration for the boot sequence.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BootConfig {
    /// Dependency connection settings.
    pub database: DatabaseConfig,

    /// Dependency prober timing.
    pub probe: ProbeConfig,

    /// Schema migration settings.
    pub migration: MigrationConfig,

    /// Request-serving listener.
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Dependency connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL (e.g., "postgres://user:secret@db:5432/app" or "memory://").
    ///
    /// May carry credentials; use [`DatabaseConfig::redacted_url`] for display.
    pub url: String,

    /// Pool size used while probing and migrating.
    pub max_connections: u32,

    /// Key of the dependency-side advisory lock guarding migrations.
    pub lock_key: i64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 2,
            lock_key: 0x626f_6f74_6761_7465,
        }
    }
}

impl DatabaseConfig {
    /// The connection URL with any password replaced by `***`.
    pub fn redacted_url(&self) -> String {
        redact_url(&self.url)
    }
}

/// Mask the password component of a connection URL.
pub fn redact_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() && parsed.set_password(Some("***")).is_err() {
                return format!("{}://...", parsed.scheme());
            }
            parsed.to_string()
        }
        Err(_) if raw.is_empty() => String::new(),
        Err(_) => "<unparsable url>".to_string(),
    }
}

/// Drop a SQLAlchemy-style driver suffix from a Postgres scheme.
///
/// `postgresql+asyncpg://...` becomes `postgresql://...`; other URLs are
/// returned unchanged.
pub fn strip_driver_suffix(raw: &str) -> String {
    let Some((scheme, rest)) = raw.split_once("://") else {
        return raw.to_string();
    };
    match scheme.split_once('+') {
        Some((base, _driver))
            if base.eq_ignore_ascii_case("postgres") || base.eq_ignore_ascii_case("postgresql") =>
        {
            format!("{base}://{rest}")
        }
        _ => raw.to_string(),
    }
}

/// Dependency prober timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Delay between probe attempts in milliseconds. Must be non-zero.
    pub interval_ms: u64,

    /// Upper bound on a single probe attempt in milliseconds.
    pub attempt_timeout_ms: u64,

    /// Overall startup deadline in milliseconds. Zero or negative fails immediately.
    pub deadline_ms: i64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            attempt_timeout_ms: 2_000,
            deadline_ms: 60_000,
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Deadline as a duration; non-positive values collapse to zero.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms.max(0) as u64)
    }
}

/// Schema migration settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MigrationConfig {
    /// Version to migrate to ("head" or an explicit version number).
    pub target: MigrationTarget,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format ("pretty" or "json").
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_password() {
        let redacted = redact_url("postgres://app:hunter2@db:5432/chs");
        assert_eq!(redacted, "postgres://app:***@db:5432/chs");
        assert!(!redacted.contains("hunter2"));
    }

    #[test]
    fn test_driver_suffix_is_stripped() {
        assert_eq!(
            strip_driver_suffix("postgresql+asyncpg://app:secret@db:5432/chs"),
            "postgresql://app:secret@db:5432/chs"
        );
        assert_eq!(
            strip_driver_suffix("postgres+psycopg2://db/chs"),
            "postgres://db/chs"
        );
        assert_eq!(strip_driver_suffix("mysql+aiomysql://db/chs"), "mysql+aiomysql://db/chs");
        assert_eq!(strip_driver_suffix("memory://"), "memory://");
    }

    #[test]
    fn test_redact_leaves_passwordless_url() {
        assert_eq!(redact_url("memory://"), "memory://");
        assert_eq!(redact_url("not a url"), "<unparsable url>");
    }

    #[test]
    fn test_negative_deadline_collapses_to_zero() {
        let probe = ProbeConfig {
            deadline_ms: -500,
            ..ProbeConfig::default()
        };
        assert_eq!(probe.deadline(), Duration::ZERO);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BootConfig = toml::from_str(
            r#"
            [database]
            url = "memory://"

            [probe]
            interval_ms = 250
            "#,
        )
        .unwrap();

        assert_eq!(config.probe.interval_ms, 250);
        assert_eq!(config.probe.attempt_timeout_ms, 2_000);
        assert_eq!(config.migration.target, MigrationTarget::Head);
        assert_eq!(config.server.bind_address, "0.0.0.0:8000");
    }
}
