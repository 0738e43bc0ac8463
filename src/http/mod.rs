//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! migrations succeeded
//!     → server.rs (bind listener)
//!     → readiness.rs (ready = true)
//!     → serve requests until shutdown
//!     → readiness.rs (ready = false), drain, exit
//! ```

pub mod readiness;
pub mod server;

pub use readiness::Readiness;
pub use server::{ServerError, ServerLauncher};
