//! Edge hub: startup and lifecycle orchestrator for an edge-side proxy.
//!
//! The hub sits between local workloads and a set of remote control-plane
//! endpoints. It proxies to whichever remote endpoint is currently healthy,
//! serves cached responses when nothing is reachable (edge mode), and can
//! hand traffic to an optional coordination endpoint once that subsystem
//! has bootstrapped in the background.

// Core subsystems
pub mod client;
pub mod config;
pub mod lifecycle;
pub mod transport;

// Data path
pub mod cache;
pub mod proxy;
pub mod server;

// Control plane
pub mod coordinator;
pub mod gc;
pub mod health;
pub mod informers;
pub mod network;
pub mod tenant;

// Cross-cutting concerns
pub mod observability;

pub use config::schema::HubConfig;
pub use lifecycle::bootstrap::run;
pub use lifecycle::shutdown::Shutdown;
