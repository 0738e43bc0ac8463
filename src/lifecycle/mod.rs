//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Boot (sequencer.rs, state.rs):
//!     WaitingForDependency → MigratingSchema → Serving
//!     any stage → Failed(stage, reason) → exit with stage exit code
//!
//! Shutdown (shutdown.rs):
//!     Signal received → abort boot stage or stop accepting → drain → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: dependency first, then schema, then listener
//! - Stages never overlap; each depends on the previous one completing
//! - Shutdown during boot aborts at the next probe or step boundary

pub mod sequencer;
pub mod shutdown;
pub mod signals;
pub mod state;

pub use sequencer::BootSequencer;
pub use shutdown::{Shutdown, ShutdownSignal};
pub use state::{BootState, Stage};
