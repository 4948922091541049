//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Remote probing (checker.rs):
//!     Periodic timer → probe each remote endpoint → hysteresis state machine
//!
//! Coordination probing (coordinator.rs):
//!     Periodic timer → probe coordination endpoint
//!     Cadence follows primary health (faster when the cloud is down)
//!
//! Fakes (fake.rs):
//!     Caller-seeded fixed answers for cloud nodes and disabled coordination
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures (no flapping)
//! - Health state is per-endpoint; overall health is "any endpoint healthy"

pub mod checker;
pub mod coordinator;
pub mod fake;

pub use checker::{CloudHealthChecker, HealthError};
pub use coordinator::CoordinatorHealthChecker;
pub use fake::FakeChecker;

use url::Url;

/// Reachability of a single watched target.
pub trait HealthChecker: Send + Sync {
    /// Whether the watched target is currently considered reachable.
    fn is_healthy(&self) -> bool;
}

/// Per-endpoint reachability over a set of remote backends.
pub trait BackendHealthChecker: HealthChecker {
    /// Whether the given remote endpoint is currently considered healthy.
    fn backend_is_healthy(&self, server: &Url) -> bool;
}
