//! Background bootstrap of the coordination subsystem.
//!
//! # Sequence
//! ```text
//! coordinator_run()                          background task
//!   ├ returns CoordinatorHandle  ──────────▶ 1. cert manager (registers informer)
//!   │   (getters usable at once)            2. fire registration signal  ◀── the
//!   │                                          bootstrap sequencer blocks on this
//!   │                                       3. poll for client certificates (bounded)
//!   │                                       4. transport → client → health checker
//!   │                                       5. elector (own task) → coordinator (own task)
//!   │                                       6. publish into the handle, state → Ready
//! ```
//!
//! Any stage failure after the signal logs, sets the state to `Failed`, and
//! leaves the subsystem degraded for the process lifetime; the primary
//! serving path is never affected.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::client::{ApiClient, RestConfigManager};
use crate::config::HubConfig;
use crate::coordinator::cert::CoordinationCertManager;
use crate::coordinator::elector::HubElector;
use crate::coordinator::handle::{CoordinatorHandle, CoordinatorState};
use crate::coordinator::hub::HubCoordinator;
use crate::coordinator::Coordinator;
use crate::health::{BackendHealthChecker, CoordinatorHealthChecker, HealthChecker};
use crate::informers::SharedInformerFactory;
use crate::lifecycle::shutdown::Shutdown;
use crate::transport::{CertManager, TransportManager};

const CERT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const CERT_POLL_TIMEOUT: Duration = Duration::from_secs(240);
const COORDINATOR_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Kick off the coordination bootstrap and return its handle immediately.
///
/// The `registered` signal fires exactly once, directly after the
/// certificate manager constructor ran — whether it succeeded or not — so
/// the caller can safely start the shared informer factory afterwards. The
/// rest of the bootstrap keeps running in the background for however long
/// it takes.
pub fn coordinator_run(
    cfg: &HubConfig,
    rest_config: Arc<RestConfigManager>,
    cloud_checker: Arc<dyn BackendHealthChecker>,
    informers: Arc<SharedInformerFactory>,
    registered: oneshot::Sender<()>,
    shutdown: &Shutdown,
) -> CoordinatorHandle {
    let handle = CoordinatorHandle::bootstrapping();

    let Some(server_url) = cfg.coordination.server_url.clone() else {
        // Validation rejects this combination; if it slips through anyway,
        // degrade instead of wedging the caller on the signal.
        tracing::error!("coordination enabled without a server_url");
        handle.set_state(CoordinatorState::Failed);
        let _ = registered.send(());
        return handle;
    };

    let task_handle = handle.clone();
    let pki_dir = cfg.coordination.pki_dir.clone();
    let node_name = cfg.node_name.clone();
    let heartbeat = Duration::from_secs(cfg.heartbeat_timeout_secs);
    let shutdown = shutdown.clone();

    tokio::spawn(async move {
        let cert_manager = CoordinationCertManager::new(&pki_dir, &informers, &shutdown);
        // The secret informer registration is done (or definitively not
        // happening); either way the caller may start the factories now.
        let _ = registered.send(());

        let cert_manager = match cert_manager {
            Ok(manager) => manager,
            Err(e) => {
                tracing::error!(error = %e, "failed to build coordination certificate manager");
                task_handle.set_state(CoordinatorState::Failed);
                return;
            }
        };
        tracing::info!("coordination certificate manager ready");

        task_handle.set_state(CoordinatorState::CertPending);
        if !wait_for_certificates(&cert_manager, CERT_POLL_INTERVAL, CERT_POLL_TIMEOUT, &shutdown)
            .await
        {
            // Best-effort degradation carried over from the original
            // behavior: proceed and let transport construction surface the
            // missing material. Flagged in DESIGN.md for review.
            tracing::error!("timed out waiting for coordination client certificates");
        }

        let transport =
            match TransportManager::new(cert_manager.clone() as Arc<dyn CertManager>) {
                Ok(transport) => Arc::new(transport),
                Err(e) => {
                    tracing::error!(error = %e, "failed to build coordination transport manager");
                    task_handle.set_state(CoordinatorState::Failed);
                    return;
                }
            };

        let client = match ApiClient::new(server_url, transport.current_transport(), heartbeat) {
            Ok(client) => client,
            Err(e) => {
                tracing::error!(error = %e, "failed to build coordination client");
                task_handle.set_state(CoordinatorState::Failed);
                return;
            }
        };

        let health_checker = CoordinatorHealthChecker::start(
            client.clone(),
            cloud_checker.clone(),
            COORDINATOR_PROBE_INTERVAL,
            &shutdown,
        );

        let elector = Arc::new(HubElector::new(
            &node_name,
            client.clone(),
            health_checker.clone() as Arc<dyn HealthChecker>,
            cloud_checker.clone(),
        ));
        elector.run(&shutdown);

        let coordinator = Arc::new(HubCoordinator::new(
            &node_name,
            client,
            cloud_checker,
            rest_config,
            cert_manager,
            elector,
        ));
        coordinator.run(&shutdown);

        task_handle.publish_ready(
            transport,
            health_checker as Arc<dyn HealthChecker>,
            coordinator as Arc<dyn Coordinator>,
        );
        tracing::info!("coordination subsystem ready");
    });

    handle
}

/// Poll until both coordination client certificates are present.
///
/// Bounded by `timeout`; returns whether the material showed up. A `false`
/// return does not stop the caller from attempting transport construction
/// exactly once.
async fn wait_for_certificates(
    certs: &CoordinationCertManager,
    interval: Duration,
    timeout: Duration,
    shutdown: &Shutdown,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if certs.api_server_client_cert().is_some()
            && certs.node_lease_proxy_client_cert().is_some()
        {
            return true;
        }
        tracing::info!("waiting for coordination client certificates");
        tokio::select! {
            _ = shutdown.triggered() => return false,
            _ = tokio::time::sleep_until(deadline) => return false,
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
