//! Ordered schema migration steps.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A recorded schema version. Version 0 is the empty schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaVersion(u32);

impl SchemaVersion {
    pub const ZERO: SchemaVersion = SchemaVersion(0);

    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version a boot should migrate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "TargetRepr", into = "String")]
pub enum MigrationTarget {
    /// Latest version in the catalog.
    #[default]
    Head,
    Version(SchemaVersion),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    Number(u32),
    Text(String),
}

impl TryFrom<TargetRepr> for MigrationTarget {
    type Error = String;

    fn try_from(repr: TargetRepr) -> Result<Self, Self::Error> {
        match repr {
            TargetRepr::Number(n) => Ok(MigrationTarget::Version(SchemaVersion::new(n))),
            TargetRepr::Text(s) => s.parse(),
        }
    }
}

impl From<MigrationTarget> for String {
    fn from(target: MigrationTarget) -> Self {
        target.to_string()
    }
}

impl FromStr for MigrationTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("head") {
            return Ok(MigrationTarget::Head);
        }
        s.parse::<u32>()
            .map(|n| MigrationTarget::Version(SchemaVersion::new(n)))
            .map_err(|_| format!("invalid migration target '{s}' (expected \"head\" or a version number)"))
    }
}

impl fmt::Display for MigrationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationTarget::Head => f.write_str("head"),
            MigrationTarget::Version(v) => write!(f, "{v}"),
        }
    }
}

/// One forward migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStep {
    /// Version recorded once this step commits.
    pub version: SchemaVersion,
    pub name: &'static str,
    pub sql: &'static str,
}

const EMBEDDED: &[MigrationStep] = &[
    MigrationStep {
        version: SchemaVersion::new(1),
        name: "create_response_logs",
        sql: include_str!("../../migrations/0001_create_response_logs.sql"),
    },
    MigrationStep {
        version: SchemaVersion::new(2),
        name: "add_response_feedback",
        sql: include_str!("../../migrations/0002_add_response_feedback.sql"),
    },
];

/// Versioned steps, sorted ascending.
#[derive(Debug, Clone)]
pub struct MigrationCatalog {
    steps: Vec<MigrationStep>,
}

impl MigrationCatalog {
    /// Steps shipped with this binary.
    pub fn embedded() -> Self {
        Self::new(EMBEDDED.to_vec())
    }

    pub fn new(mut steps: Vec<MigrationStep>) -> Self {
        steps.sort_by_key(|s| s.version);
        Self { steps }
    }

    /// Latest known version.
    pub fn head(&self) -> SchemaVersion {
        self.steps
            .last()
            .map(|s| s.version)
            .unwrap_or(SchemaVersion::ZERO)
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    /// Whether versions run 1, 2, 3, … without gaps or duplicates.
    pub fn is_contiguous(&self) -> bool {
        self.steps
            .iter()
            .enumerate()
            .all(|(i, s)| s.version.get() as usize == i + 1)
    }

    /// Concrete version for a target, or `None` when beyond the catalog.
    pub fn resolve(&self, target: MigrationTarget) -> Option<SchemaVersion> {
        match target {
            MigrationTarget::Head => Some(self.head()),
            MigrationTarget::Version(v) if v <= self.head() => Some(v),
            MigrationTarget::Version(_) => None,
        }
    }

    /// Steps needed to go from `current` to `target`, in order.
    pub fn pending(&self, current: SchemaVersion, target: SchemaVersion) -> Vec<&MigrationStep> {
        self.steps
            .iter()
            .filter(|s| s.version > current && s.version <= target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_catalog_is_contiguous() {
        let catalog = MigrationCatalog::embedded();
        assert!(catalog.is_contiguous());
        assert_eq!(catalog.head(), SchemaVersion::new(2));
        assert!(catalog.steps()[0].sql.contains("CREATE TABLE IF NOT EXISTS response_logs"));
    }

    #[test]
    fn test_embedded_steps_tolerate_existing_objects() {
        // Databases created before schema_migrations existed already hold these objects.
        for step in MigrationCatalog::embedded().steps() {
            for statement in step.sql.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                assert!(
                    statement.contains("IF NOT EXISTS"),
                    "step {} has an unguarded statement: {statement}",
                    step.version
                );
            }
        }
    }

    #[test]
    fn test_pending_steps() {
        let catalog = MigrationCatalog::embedded();
        let pending = catalog.pending(SchemaVersion::ZERO, catalog.head());
        let names: Vec<_> = pending.iter().map(|s| s.name).collect();
        assert_eq!(names, ["create_response_logs", "add_response_feedback"]);

        assert!(catalog.pending(catalog.head(), catalog.head()).is_empty());
        assert_eq!(catalog.pending(SchemaVersion::new(1), SchemaVersion::new(2)).len(), 1);
    }

    #[test]
    fn test_resolve_target() {
        let catalog = MigrationCatalog::embedded();
        assert_eq!(catalog.resolve(MigrationTarget::Head), Some(SchemaVersion::new(2)));
        assert_eq!(
            catalog.resolve(MigrationTarget::Version(SchemaVersion::new(1))),
            Some(SchemaVersion::new(1))
        );
        assert_eq!(catalog.resolve(MigrationTarget::Version(SchemaVersion::new(3))), None);
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("HEAD".parse::<MigrationTarget>(), Ok(MigrationTarget::Head));
        assert_eq!(
            "7".parse::<MigrationTarget>(),
            Ok(MigrationTarget::Version(SchemaVersion::new(7)))
        );
        assert!("latest".parse::<MigrationTarget>().is_err());
    }

    #[test]
    fn test_target_deserializes_from_string_or_number() {
        #[derive(Deserialize)]
        struct Wrapper {
            target: MigrationTarget,
        }

        let w: Wrapper = toml::from_str("target = \"head\"").unwrap();
        assert_eq!(w.target, MigrationTarget::Head);
        let w: Wrapper = toml::from_str("target = 1").unwrap();
        assert_eq!(w.target, MigrationTarget::Version(SchemaVersion::new(1)));
    }

    #[test]
    fn test_gap_is_detected() {
        let catalog = MigrationCatalog::new(vec![
            MigrationStep { version: SchemaVersion::new(1), name: "a", sql: "" },
            MigrationStep { version: SchemaVersion::new(3), name: "c", sql: "" },
        ]);
        assert!(!catalog.is_contiguous());
    }
}
