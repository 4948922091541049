//! Rest-config management.
//!
//! Downstream consumers (GC, hub server readiness) do not talk to a fixed
//! endpoint; they ask this manager for the config of whichever remote
//! endpoint is currently healthy. When every endpoint is down the manager
//! hands out the last config that worked, so consumers keep a usable target
//! through short flaps.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use thiserror::Error;
use url::Url;

use crate::client::ApiClient;
use crate::health::BackendHealthChecker;
use crate::transport::{HttpClient, TransportManager};

/// Connection parameters for one remote endpoint.
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Error)]
pub enum RestConfigError {
    #[error("no remote servers configured")]
    NoRemoteServers,
}

/// Supplies the currently-healthy endpoint's config to downstream consumers.
pub struct RestConfigManager {
    servers: Vec<Url>,
    checker: Arc<dyn BackendHealthChecker>,
    transport: HttpClient,
    timeout: Duration,
    last_good: ArcSwapOption<ApiServerConfig>,
}

impl RestConfigManager {
    pub fn new(
        transport: &TransportManager,
        checker: Arc<dyn BackendHealthChecker>,
        servers: Vec<Url>,
        heartbeat_timeout_secs: u64,
    ) -> Result<Self, RestConfigError> {
        if servers.is_empty() {
            return Err(RestConfigError::NoRemoteServers);
        }
        Ok(Self {
            servers,
            checker,
            transport: transport.current_transport(),
            timeout: Duration::from_secs(heartbeat_timeout_secs),
            last_good: ArcSwapOption::empty(),
        })
    }

    /// Config of the first healthy endpoint in preference order, falling
    /// back to the last config that worked.
    pub fn current_config(&self) -> Option<ApiServerConfig> {
        let healthy = self
            .servers
            .iter()
            .find(|server| self.checker.backend_is_healthy(server));
        match healthy {
            Some(server) => {
                let config = ApiServerConfig {
                    base_url: server.clone(),
                    timeout: self.timeout,
                };
                self.last_good.store(Some(Arc::new(config.clone())));
                Some(config)
            }
            None => self.last_good.load_full().map(|c| (*c).clone()),
        }
    }

    /// An API client for the currently-healthy endpoint.
    pub fn client_for_current(&self) -> Option<ApiClient> {
        self.current_config()
            .and_then(|c| ApiClient::new(c.base_url, self.transport.clone(), c.timeout).ok())
    }
}

impl std::fmt::Debug for RestConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestConfigManager")
            .field("servers", &self.servers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::FakeChecker;
    use crate::transport::test_support::test_transport;

    fn servers() -> Vec<Url> {
        vec![
            Url::parse("http://10.0.0.1:6443").unwrap(),
            Url::parse("http://10.0.0.2:6443").unwrap(),
        ]
    }

    #[test]
    fn test_requires_servers() {
        let transport = test_transport();
        let err = RestConfigManager::new(
            &transport,
            Arc::new(FakeChecker::new(true)),
            Vec::new(),
            2,
        )
        .unwrap_err();
        assert!(matches!(err, RestConfigError::NoRemoteServers));
    }

    #[test]
    fn test_picks_first_healthy_in_order() {
        let transport = test_transport();
        let manager = RestConfigManager::new(
            &transport,
            Arc::new(FakeChecker::new(true)),
            servers(),
            2,
        )
        .unwrap();
        let config = manager.current_config().unwrap();
        assert_eq!(config.base_url, servers()[0]);
    }

    #[test]
    fn test_no_healthy_backend_without_history_yields_none() {
        let transport = test_transport();
        let manager = RestConfigManager::new(
            &transport,
            Arc::new(FakeChecker::new(false)),
            servers(),
            2,
        )
        .unwrap();
        assert!(manager.current_config().is_none());
        assert!(manager.client_for_current().is_none());
    }
}
