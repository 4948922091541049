//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! TOML file → loader.rs → schema.rs structs → validation.rs → accepted config
//! ```
//!
//! # Design Decisions
//! - Configuration is immutable after load; there is no hot reload
//! - Validation is a pure function returning all errors at once
//! - Every section has usable defaults so partial files parse

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, CertificateConfig, CoordinationConfig, GcConfig, HealthCheckConfig, HubConfig,
    ListenerConfig, NetworkConfig, NodeMode, ObservabilityConfig, TenantConfig, TlsConfig,
};
