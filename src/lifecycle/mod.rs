//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (bootstrap.rs):
//!     Validated config → construct subsystems in order → serve
//!
//! Shutdown (shutdown.rs):
//!     One process-wide signal → every loop exits → serve call returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: transport first, then clients, health, data path,
//!   coordination hand-off, listeners last
//! - The serve call is the only place the primary path observes cancellation

pub mod bootstrap;
pub mod shutdown;
pub mod signals;

pub use bootstrap::{run, BootstrapError};
pub use shutdown::Shutdown;
