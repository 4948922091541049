//! Optional coordination subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle.rs (background bootstrap):
//!     cert manager → fire registration signal → cert poll → transport
//!     → client → health checker → elector → coordinator → publish
//!
//! handle.rs:
//!     The caller-facing view: state plus three getters that are safe to
//!     call at any point of the bootstrap, from any task
//!
//! fake.rs:
//!     Inert coordinator used while the subsystem is disabled
//! ```
//!
//! # Design Decisions
//! - Bootstrap failures degrade, never abort the process; the state becomes
//!   Failed and stays there for the process lifetime
//! - Consumers hold the handle and re-read it per use, never a snapshot

pub mod cert;
pub mod elector;
pub mod fake;
pub mod handle;
pub mod hub;
pub mod lifecycle;

pub use cert::{CertError, CoordinationCertManager};
pub use elector::{ElectionRole, HubElector};
pub use fake::FakeCoordinator;
pub use handle::{CoordinatorHandle, CoordinatorState};
pub use hub::HubCoordinator;
pub use lifecycle::coordinator_run;

/// Capability surface of a coordinator, real or fake.
pub trait Coordinator: Send + Sync {
    /// Whether the coordinator has completed at least one sync cycle.
    fn is_ready(&self) -> bool;

    /// Whether this hub currently holds the coordination lease.
    fn is_leader(&self) -> bool;
}
