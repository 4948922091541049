//! Hub election against the coordination endpoint.
//!
//! One hub per pool holds the coordination lease and does the coordinator's
//! leader work. The election itself is a thin claim loop over the
//! coordination client; the lease semantics live server-side.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client::ApiClient;
use crate::health::{BackendHealthChecker, HealthChecker};
use crate::lifecycle::shutdown::Shutdown;

const ELECTION_PERIOD: Duration = Duration::from_secs(15);

/// This hub's current standing in the election.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionRole {
    /// No usable coordination endpoint, or no claim attempted yet.
    Pending,
    /// Another hub holds the lease.
    Follower,
    /// This hub holds the lease.
    Leader,
}

impl ElectionRole {
    fn as_u8(self) -> u8 {
        match self {
            ElectionRole::Pending => 0,
            ElectionRole::Follower => 1,
            ElectionRole::Leader => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ElectionRole::Follower,
            2 => ElectionRole::Leader,
            _ => ElectionRole::Pending,
        }
    }
}

/// Periodic lease-claim loop.
pub struct HubElector {
    node_name: String,
    client: ApiClient,
    coordinator_checker: Arc<dyn HealthChecker>,
    cloud_checker: Arc<dyn BackendHealthChecker>,
    role: AtomicU8,
}

impl HubElector {
    pub fn new(
        node_name: &str,
        client: ApiClient,
        coordinator_checker: Arc<dyn HealthChecker>,
        cloud_checker: Arc<dyn BackendHealthChecker>,
    ) -> Self {
        Self {
            node_name: node_name.to_string(),
            client,
            coordinator_checker,
            cloud_checker,
            role: AtomicU8::new(ElectionRole::Pending.as_u8()),
        }
    }

    pub fn role(&self) -> ElectionRole {
        ElectionRole::from_u8(self.role.load(Ordering::Acquire))
    }

    pub fn is_leader(&self) -> bool {
        self.role() == ElectionRole::Leader
    }

    /// Start the election loop. Fire-and-forget; exits on shutdown.
    pub fn run(self: &Arc<Self>, shutdown: &Shutdown) {
        let elector = self.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tracing::info!(node = %elector.node_name, "hub elector starting");
            loop {
                elector.campaign_once().await;
                // A pool without cloud connectivity needs its leader sooner.
                let wait = if elector.cloud_checker.is_healthy() {
                    ELECTION_PERIOD
                } else {
                    ELECTION_PERIOD / 3
                };
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.triggered() => {
                        tracing::info!("hub elector exiting");
                        break;
                    }
                }
            }
        });
    }

    async fn campaign_once(&self) {
        if !self.coordinator_checker.is_healthy() {
            self.transition(ElectionRole::Pending);
            return;
        }
        match self.client.claim_lease(&self.node_name).await {
            Ok(true) => self.transition(ElectionRole::Leader),
            Ok(false) => self.transition(ElectionRole::Follower),
            Err(e) => {
                tracing::debug!(error = %e, "lease claim failed");
                self.transition(ElectionRole::Pending);
            }
        }
    }

    fn transition(&self, role: ElectionRole) {
        let previous =
            ElectionRole::from_u8(self.role.swap(role.as_u8(), Ordering::AcqRel));
        if previous != role {
            tracing::info!(node = %self.node_name, ?previous, current = ?role, "election role changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::FakeChecker;
    use crate::transport::test_support::test_transport;
    use url::Url;

    fn elector(coordinator_healthy: bool) -> HubElector {
        let transport = test_transport();
        let client = ApiClient::new(
            Url::parse("http://127.0.0.1:1").unwrap(),
            transport.current_transport(),
            Duration::from_millis(200),
        )
        .unwrap();
        HubElector::new(
            "edge-0",
            client,
            Arc::new(FakeChecker::new(coordinator_healthy)),
            Arc::new(FakeChecker::new(true)),
        )
    }

    #[test]
    fn test_role_starts_pending() {
        assert_eq!(elector(true).role(), ElectionRole::Pending);
    }

    #[tokio::test]
    async fn test_unhealthy_coordinator_keeps_role_pending() {
        let elector = elector(false);
        elector.campaign_once().await;
        assert_eq!(elector.role(), ElectionRole::Pending);
        assert!(!elector.is_leader());
    }

    #[tokio::test]
    async fn test_failed_claim_falls_back_to_pending() {
        // Coordinator reported healthy but the endpoint is unreachable:
        // the claim errors and the elector must not report leadership.
        let elector = elector(true);
        elector.campaign_once().await;
        assert_eq!(elector.role(), ElectionRole::Pending);
    }
}
