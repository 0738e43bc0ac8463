//! Boot state machine.
//!
//! # States
//! - WaitingForDependency: probing the dependency
//! - MigratingSchema: dependency healthy, migrations running
//! - Serving: listener bound, traffic accepted
//! - Failed: terminal, tagged with the failing stage
//!
//! # State Transitions
//! ```text
//! WaitingForDependency → MigratingSchema → Serving
//! any non-terminal state → Failed
//! ```

use std::fmt;

/// Boot stage, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Dependency,
    Migration,
    Server,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Dependency => "dependency",
            Stage::Migration => "migration",
            Stage::Server => "server",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one boot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BootState {
    #[default]
    WaitingForDependency,
    MigratingSchema,
    Serving,
    Failed { stage: Stage, reason: String },
}

impl BootState {
    /// Position in the forward order; `Failed` sorts last.
    pub fn ordinal(&self) -> u8 {
        match self {
            BootState::WaitingForDependency => 0,
            BootState::MigratingSchema => 1,
            BootState::Serving => 2,
            BootState::Failed { .. } => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BootState::Failed { .. })
    }

    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(&self, next: &BootState) -> bool {
        match (self, next) {
            (BootState::Failed { .. }, _) => false,
            (_, BootState::Failed { .. }) => true,
            (current, next) => next.ordinal() == current.ordinal() + 1,
        }
    }
}

impl fmt::Display for BootState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootState::WaitingForDependency => f.write_str("waiting_for_dependency"),
            BootState::MigratingSchema => f.write_str("migrating_schema"),
            BootState::Serving => f.write_str("serving"),
            BootState::Failed { stage, .. } => write!(f, "failed({stage})"),
        }
    }
}
