//! Active health checking of the remote endpoints.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::time;
use url::Url;

use crate::client::ApiClient;
use crate::config::HealthCheckConfig;
use crate::health::{BackendHealthChecker, HealthChecker};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum HealthError {
    #[error("no remote endpoints to probe")]
    NoBackends,
}

#[derive(Debug, Clone, Copy)]
struct EndpointState {
    healthy: bool,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl Default for EndpointState {
    fn default() -> Self {
        // Assume healthy until proven otherwise so startup traffic is not
        // rejected before the first probe round completes.
        Self {
            healthy: true,
            consecutive_failures: 0,
            consecutive_successes: 0,
        }
    }
}

/// Probes every remote endpoint on a fixed interval and tracks per-endpoint
/// health with hysteresis.
pub struct CloudHealthChecker {
    servers: Vec<Url>,
    clients: HashMap<String, ApiClient>,
    state: DashMap<String, EndpointState>,
    config: HealthCheckConfig,
}

impl std::fmt::Debug for CloudHealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudHealthChecker")
            .field("servers", &self.servers)
            .finish_non_exhaustive()
    }
}

impl CloudHealthChecker {
    /// Run one initial probe round, then keep probing in the background
    /// until shutdown.
    pub async fn start(
        config: HealthCheckConfig,
        servers: Vec<Url>,
        clients: HashMap<String, ApiClient>,
        shutdown: &Shutdown,
    ) -> Result<Arc<Self>, HealthError> {
        if servers.is_empty() || clients.is_empty() {
            return Err(HealthError::NoBackends);
        }

        let state = servers
            .iter()
            .map(|s| (s.to_string(), EndpointState::default()))
            .collect();
        let checker = Arc::new(Self {
            servers,
            clients,
            state,
            config,
        });

        checker.probe_all().await;

        let looping = checker.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            looping.run(shutdown).await;
        });

        Ok(checker)
    }

    async fn run(&self, shutdown: Shutdown) {
        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            endpoints = self.servers.len(),
            "remote health prober starting"
        );
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.tick().await; // first tick fires immediately; the initial round already ran
        loop {
            tokio::select! {
                _ = ticker.tick() => self.probe_all().await,
                _ = shutdown.triggered() => {
                    tracing::info!("remote health prober exiting");
                    break;
                }
            }
        }
    }

    async fn probe_all(&self) {
        for server in &self.servers {
            let key = server.to_string();
            let Some(client) = self.clients.get(&key) else {
                continue;
            };
            let ok = matches!(
                client.healthz(&self.config.path).await,
                Ok(status) if status.is_success()
            );
            self.observe(&key, ok);
            metrics::record_backend_health(&key, self.backend_is_healthy(server));
        }
    }

    /// Feed one probe result through the hysteresis state machine.
    fn observe(&self, key: &str, ok: bool) {
        let Some(mut entry) = self.state.get_mut(key) else {
            return;
        };
        if ok {
            entry.consecutive_successes += 1;
            entry.consecutive_failures = 0;
            if !entry.healthy && entry.consecutive_successes >= self.config.healthy_threshold {
                entry.healthy = true;
                entry.consecutive_successes = 0;
                tracing::info!(endpoint = key, "remote endpoint back to healthy");
            }
        } else {
            entry.consecutive_failures += 1;
            entry.consecutive_successes = 0;
            if entry.healthy && entry.consecutive_failures >= self.config.unhealthy_threshold {
                entry.healthy = false;
                entry.consecutive_failures = 0;
                tracing::warn!(endpoint = key, "remote endpoint marked unhealthy");
            }
        }
    }
}

impl HealthChecker for CloudHealthChecker {
    fn is_healthy(&self) -> bool {
        self.state.iter().any(|entry| entry.value().healthy)
    }
}

impl BackendHealthChecker for CloudHealthChecker {
    fn backend_is_healthy(&self, server: &Url) -> bool {
        self.state
            .get(&server.to_string())
            .map(|entry| entry.healthy)
            .unwrap_or(false)
    }
}
