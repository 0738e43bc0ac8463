//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{strip_driver_suffix, BootConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable that overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration.
///
/// Reads the TOML file when a path is given (defaults otherwise), then applies
/// environment overrides, then validates.
pub fn load_config(path: Option<&Path>) -> Result<BootConfig, ConfigError> {
    let config = match path {
        Some(path) => parse_config(&fs::read_to_string(path)?)?,
        None => BootConfig::default(),
    };

    let config = apply_env_overrides(config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML document into a configuration without validating it.
pub fn parse_config(content: &str) -> Result<BootConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Apply environment overrides using the given lookup.
///
/// The resulting database URL is normalized so SQLAlchemy driver URLs such as
/// `postgresql+asyncpg://` are accepted.
pub fn apply_env_overrides<F>(mut config: BootConfig, lookup: F) -> BootConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
        config.database.url = url;
    }
    config.database.url = strip_driver_suffix(&config.database.url);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides_file_url() {
        let config = parse_config(
            r#"
            [database]
            url = "postgres://file@localhost/app"
            "#,
        )
        .unwrap();

        let config = apply_env_overrides(config, |key| {
            (key == DATABASE_URL_ENV).then(|| "postgres://env@db/app".to_string())
        });
        assert_eq!(config.database.url, "postgres://env@db/app");
    }

    #[test]
    fn test_sqlalchemy_driver_url_is_accepted() {
        let mut config = BootConfig::default();
        config.database.url = "memory://".to_string();

        let config = apply_env_overrides(config, |key| {
            (key == DATABASE_URL_ENV)
                .then(|| "postgresql+asyncpg://app:secret@db:5432/chs".to_string())
        });

        assert_eq!(config.database.url, "postgresql://app:secret@db:5432/chs");
        assert_eq!(validate_config(&config), Ok(()));
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let mut config = BootConfig::default();
        config.database.url = "memory://".to_string();
        let config = apply_env_overrides(config, |_| Some("  ".to_string()));
        assert_eq!(config.database.url, "memory://");
    }

    #[test]
    fn test_parse_error_surfaces() {
        let err = parse_config("[probe]\ninterval_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_lists_every_problem() {
        let err = ConfigError::Validation(vec![
            ValidationError::MissingDatabaseUrl,
            ValidationError::ZeroInterval,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: database.url is required, probe.interval_ms must be greater than zero"
        );
    }
}
