//! Health checking of the coordination endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::client::ApiClient;
use crate::health::{BackendHealthChecker, HealthChecker};
use crate::lifecycle::shutdown::Shutdown;

/// Probes the coordination endpoint, with a cadence that follows the
/// primary checker: when the cloud is unreachable this hub may be carrying
/// lease traffic through the coordinator, so probing tightens.
pub struct CoordinatorHealthChecker {
    client: ApiClient,
    cloud: Arc<dyn BackendHealthChecker>,
    endpoint_healthy: AtomicBool,
}

impl CoordinatorHealthChecker {
    pub fn start(
        client: ApiClient,
        cloud: Arc<dyn BackendHealthChecker>,
        interval: Duration,
        shutdown: &Shutdown,
    ) -> Arc<Self> {
        let checker = Arc::new(Self {
            client,
            cloud,
            endpoint_healthy: AtomicBool::new(false),
        });

        let looping = checker.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            tracing::info!(
                endpoint = %looping.client.base_url(),
                "coordination health prober starting"
            );
            loop {
                looping.probe_once().await;
                let wait = if looping.cloud.is_healthy() {
                    interval
                } else {
                    interval / 2
                };
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = shutdown.triggered() => {
                        tracing::info!("coordination health prober exiting");
                        break;
                    }
                }
            }
        });

        checker
    }

    async fn probe_once(&self) {
        let ok = matches!(
            self.client.healthz("/healthz").await,
            Ok(status) if status.is_success()
        );
        let was = self.endpoint_healthy.swap(ok, Ordering::AcqRel);
        if was != ok {
            if ok {
                tracing::info!("coordination endpoint healthy");
            } else {
                tracing::warn!("coordination endpoint unhealthy");
            }
        }
    }
}

impl HealthChecker for CoordinatorHealthChecker {
    fn is_healthy(&self) -> bool {
        self.endpoint_healthy.load(Ordering::Acquire)
    }
}
