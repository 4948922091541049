//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the hub.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Operating mode of the node this hub runs on.
///
/// Fixed for the process lifetime: it is read once at startup and selects
/// which component set the bootstrap sequence constructs. Cloud nodes never
/// get a cache manager, a GC manager, or a real remote health checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMode {
    /// Edge node: probes remote endpoints, caches responses locally.
    #[default]
    Edge,
    /// Cloud node: co-located with the control plane, no local caching.
    Cloud,
}

impl std::fmt::Display for NodeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeMode::Edge => write!(f, "edge"),
            NodeMode::Cloud => write!(f, "cloud"),
        }
    }
}

/// Root configuration for the hub.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HubConfig {
    /// Name of the node this hub serves.
    pub node_name: String,

    /// Operating mode (edge or cloud).
    pub mode: NodeMode,

    /// Remote control-plane endpoints, in preference order.
    pub remote_servers: Vec<Url>,

    /// Per-request timeout for heartbeat/probe requests, in seconds.
    pub heartbeat_timeout_secs: u64,

    /// Optional coordination subsystem settings.
    pub coordination: CoordinationConfig,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Client certificate material for the primary transport.
    pub certificates: CertificateConfig,

    /// Local response cache settings (edge mode only).
    pub cache: CacheConfig,

    /// Cache garbage collection settings (edge mode only).
    pub gc: GcConfig,

    /// Tenant/service-account resolution settings.
    pub tenant: TenantConfig,

    /// Remote endpoint health probing settings.
    pub health_check: HealthCheckConfig,

    /// Auxiliary network management settings.
    pub network: NetworkConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            node_name: String::new(),
            mode: NodeMode::default(),
            remote_servers: Vec::new(),
            heartbeat_timeout_secs: 2,
            coordination: CoordinationConfig::default(),
            listener: ListenerConfig::default(),
            certificates: CertificateConfig::default(),
            cache: CacheConfig::default(),
            gc: GcConfig::default(),
            tenant: TenantConfig::default(),
            health_check: HealthCheckConfig::default(),
            network: NetworkConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Optional coordination subsystem configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoordinationConfig {
    /// Enable the coordination subsystem.
    pub enabled: bool,

    /// Coordination endpoint URL. Required when `enabled` is set.
    pub server_url: Option<Url>,

    /// Directory holding the coordination client certificate material.
    pub pki_dir: PathBuf,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_url: None,
            pki_dir: PathBuf::from("/var/lib/edgehub/coordination/pki"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Request timeout for proxied requests in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            request_timeout_secs: 30,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Client certificate material used by the primary transport manager.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CertificateConfig {
    /// Path to the client certificate (PEM).
    pub cert_path: PathBuf,

    /// Path to the client private key (PEM).
    pub key_path: PathBuf,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            cert_path: PathBuf::from("/var/lib/edgehub/pki/client.crt"),
            key_path: PathBuf::from("/var/lib/edgehub/pki/client.key"),
        }
    }
}

/// Local response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory the cache stores response bodies under.
    pub root_dir: PathBuf,

    /// Largest response body the cache will store, in bytes.
    pub max_entry_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/var/cache/edgehub"),
            max_entry_bytes: 1024 * 1024,
        }
    }
}

/// Cache garbage collection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GcConfig {
    /// Base sweep frequency in minutes. The interval between sweeps is a
    /// random duration between this and three times this value.
    pub frequency_mins: u64,

    /// Age after which a cache entry is eligible for collection, in minutes.
    pub max_age_mins: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            frequency_mins: 120,
            max_age_mins: 720,
        }
    }
}

/// Tenant/service-account resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TenantConfig {
    /// Tenant namespace this hub serves. Empty disables tenant handling.
    pub namespace: String,

    /// File the tenant service-account token is read from.
    pub token_file: Option<PathBuf>,
}

/// Remote endpoint health probing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe on each remote endpoint.
    pub path: String,

    /// Number of consecutive failures before marking unhealthy.
    pub unhealthy_threshold: u32,

    /// Number of consecutive successes before marking healthy.
    pub healthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            timeout_secs: 5,
            path: "/healthz".to_string(),
            unhealthy_threshold: 3,
            healthy_threshold: 2,
        }
    }
}

/// Auxiliary network management configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Enable the auxiliary network manager.
    pub enabled: bool,

    /// Interval between network checks in seconds.
    pub check_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            check_interval_secs: 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HubConfig::default();
        assert_eq!(config.mode, NodeMode::Edge);
        assert!(config.remote_servers.is_empty());
        assert_eq!(config.heartbeat_timeout_secs, 2);
        assert!(!config.coordination.enabled);
        assert_eq!(config.gc.frequency_mins, 120);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: HubConfig = toml::from_str(
            r#"
            node_name = "edge-0"
            mode = "cloud"
            remote_servers = ["http://10.0.0.1:6443", "http://10.0.0.2:6443"]
            "#,
        )
        .unwrap();
        assert_eq!(config.node_name, "edge-0");
        assert_eq!(config.mode, NodeMode::Cloud);
        assert_eq!(config.remote_servers.len(), 2);
        // Untouched sections keep their defaults.
        assert_eq!(config.health_check.interval_secs, 10);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(NodeMode::Edge.to_string(), "edge");
        assert_eq!(NodeMode::Cloud.to_string(), "cloud");
    }
}
