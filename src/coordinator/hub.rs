//! The coordinator run loop.
//!
//! A ready coordinator keeps the pool-side view of this node current: the
//! leader renews its standing every cycle, followers only verify that the
//! coordination endpoint still answers. Lease delegation for the pool needs
//! the node-lease-proxy certificate, so that work is skipped until the
//! certificate manager has it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client::{ApiClient, RestConfigManager};
use crate::coordinator::cert::CoordinationCertManager;
use crate::coordinator::elector::HubElector;
use crate::coordinator::Coordinator;
use crate::health::BackendHealthChecker;
use crate::lifecycle::shutdown::Shutdown;

const SYNC_PERIOD: Duration = Duration::from_secs(30);

/// Coordinator backed by the coordination endpoint.
pub struct HubCoordinator {
    node_name: String,
    client: ApiClient,
    cloud_checker: Arc<dyn BackendHealthChecker>,
    rest_config: Arc<RestConfigManager>,
    certs: Arc<CoordinationCertManager>,
    elector: Arc<HubElector>,
    ready: AtomicBool,
}

impl HubCoordinator {
    pub fn new(
        node_name: &str,
        client: ApiClient,
        cloud_checker: Arc<dyn BackendHealthChecker>,
        rest_config: Arc<RestConfigManager>,
        certs: Arc<CoordinationCertManager>,
        elector: Arc<HubElector>,
    ) -> Self {
        Self {
            node_name: node_name.to_string(),
            client,
            cloud_checker,
            rest_config,
            certs,
            elector,
            ready: AtomicBool::new(false),
        }
    }

    /// Start the sync loop. Fire-and-forget; exits on shutdown.
    pub fn run(self: &Arc<Self>, shutdown: &Shutdown) {
        let coordinator = self.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tracing::info!(node = %coordinator.node_name, "coordinator starting");
            loop {
                coordinator.sync_cycle().await;
                tokio::select! {
                    _ = tokio::time::sleep(SYNC_PERIOD) => {}
                    _ = shutdown.triggered() => {
                        tracing::info!("coordinator exiting");
                        break;
                    }
                }
            }
        });
    }

    async fn sync_cycle(&self) {
        let reachable = matches!(
            self.client.healthz("/healthz").await,
            Ok(status) if status.is_success()
        );
        if !reachable {
            if self.ready.swap(false, Ordering::AcqRel) {
                tracing::warn!("coordinator lost the coordination endpoint");
            }
            return;
        }
        if !self.ready.swap(true, Ordering::AcqRel) {
            tracing::info!(node = %self.node_name, "coordinator ready");
        }

        if self.elector.is_leader() {
            self.leader_cycle().await;
        }
    }

    /// Leader work: keep the pool lease delegation alive while the cloud is
    /// unreachable from other pool members.
    async fn leader_cycle(&self) {
        if self.certs.node_lease_proxy_client_cert().is_none() {
            tracing::debug!("lease delegation deferred, proxy certificate not yet available");
            return;
        }
        let cloud_reachable =
            self.cloud_checker.is_healthy() && self.rest_config.current_config().is_some();
        match self.client.claim_lease(&self.node_name).await {
            Ok(true) => {
                tracing::debug!(cloud_reachable, "pool lease renewed");
            }
            Ok(false) => {
                tracing::info!("pool lease now held by another hub");
            }
            Err(e) => {
                tracing::debug!(error = %e, "pool lease renewal failed");
            }
        }
    }
}

impl Coordinator for HubCoordinator {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn is_leader(&self) -> bool {
        self.elector.is_leader()
    }
}
