//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct all subsystems in dependency order
//! - Branch construction on the node's operating mode
//! - Wait for the one-shot informer-registration signal when coordination
//!   is enabled, then start the shared informer factory
//! - Start the listeners last and block until cancellation
//!
//! # Design Decisions
//! - Fail fast: any construction error before the coordination hand-off is
//!   fatal and aborts startup with an error naming the failed step
//! - Coordination bootstrap failures are never fatal here; they degrade
//! - Ordinary shutdown returns `Ok`, never an error

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::cache::{CacheError, CacheManager};
use crate::client::rest::RestConfigError;
use crate::client::{create_clients, ClientError, RestConfigManager};
use crate::config::{HubConfig, NodeMode};
use crate::coordinator::{coordinator_run, CoordinatorHandle};
use crate::gc::{GcError, GcManager};
use crate::health::{BackendHealthChecker, CloudHealthChecker, FakeChecker, HealthError};
use crate::informers::SharedInformerFactory;
use crate::lifecycle::shutdown::Shutdown;
use crate::network::NetworkManager;
use crate::proxy::{HubProxyHandler, ProxyError};
use crate::server::{run_hub_servers, ServerError};
use crate::tenant::TenantManager;
use crate::transport::{CertManager, FileCertManager, TransportError, TransportManager};

/// A fatal construction failure, naming the step that failed.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("could not build transport manager: {0}")]
    Transport(#[from] TransportError),

    #[error("could not create remote endpoint clients: {0}")]
    Clients(#[from] ClientError),

    #[error("could not build remote health checker: {0}")]
    HealthChecker(#[from] HealthError),

    #[error("could not build rest config manager: {0}")]
    RestConfig(#[from] RestConfigError),

    #[error("could not open local cache: {0}")]
    Cache(#[from] CacheError),

    #[error("could not build gc manager: {0}")]
    Gc(#[from] GcError),

    #[error("could not build proxy handler: {0}")]
    Proxy(#[from] ProxyError),

    #[error("hub server failed: {0}")]
    Server(#[from] ServerError),
}

/// Construct and wire every subsystem, then serve until cancellation.
///
/// This should only return an error for construction failures that make
/// serving impossible; returning after the shutdown signal is the normal
/// exit and yields `Ok(())`.
pub async fn run(cfg: HubConfig, shutdown: Shutdown) -> Result<(), BootstrapError> {
    let mut step = 0u32;

    step += 1;
    tracing::info!(step, "building transport manager for remote endpoints");
    let cert_manager: Arc<dyn CertManager> = Arc::new(FileCertManager::load(&cfg.certificates)?);
    let transport = TransportManager::new(cert_manager.clone())?;

    step += 1;
    tracing::info!(step, "preparing remote endpoint clients");
    let clients = create_clients(cfg.heartbeat_timeout_secs, &cfg.remote_servers, &transport)?;

    step += 1;
    let cloud_checker: Arc<dyn BackendHealthChecker> = match cfg.mode {
        NodeMode::Edge => {
            tracing::info!(step, "creating health checker for remote endpoints");
            CloudHealthChecker::start(
                cfg.health_check.clone(),
                cfg.remote_servers.clone(),
                clients,
                &shutdown,
            )
            .await?
        }
        NodeMode::Cloud => {
            tracing::info!(
                step,
                node = %cfg.node_name,
                "cloud node, remote health probing disabled"
            );
            // Cloud nodes sit next to the control plane; the stand-in
            // checker reports the cloud healthy and never probes.
            Arc::new(FakeChecker::new(true))
        }
    };

    step += 1;
    tracing::info!(step, "building rest config manager");
    let rest_config = Arc::new(RestConfigManager::new(
        &transport,
        cloud_checker.clone(),
        cfg.remote_servers.clone(),
        cfg.heartbeat_timeout_secs,
    )?);

    step += 1;
    let cache = match cfg.mode {
        NodeMode::Edge => {
            tracing::info!(step, "opening local response cache");
            Some(Arc::new(CacheManager::open(&cfg.cache)?))
        }
        NodeMode::Cloud => {
            tracing::info!(step, node = %cfg.node_name, "cloud node, local caching disabled");
            None
        }
    };

    step += 1;
    if let Some(cache) = &cache {
        tracing::info!(step, "starting cache gc manager");
        let gc = GcManager::new(&cfg.gc, cache.clone(), rest_config.clone())?;
        gc.run(&shutdown);
    } else {
        tracing::info!(step, node = %cfg.node_name, "cloud node, gc manager disabled");
    }

    step += 1;
    tracing::info!(step, "building tenant manager");
    let informers = Arc::new(SharedInformerFactory::new());
    let tenant = TenantManager::new(&cfg.tenant, &informers, &shutdown);

    step += 1;
    let coordinator = if cfg.coordination.enabled {
        tracing::info!(step, "starting coordination bootstrap");
        let (registered_tx, registered_rx) = oneshot::channel();
        let handle = coordinator_run(
            &cfg,
            rest_config.clone(),
            cloud_checker.clone(),
            informers.clone(),
            registered_tx,
            &shutdown,
        );
        tracing::info!("waiting for coordination informer registration");
        if registered_rx.await.is_err() {
            // The bootstrap task died before signalling; the subsystem is
            // degraded but the primary path must not deadlock on it.
            tracing::warn!("coordination bootstrap exited before informer registration");
        }
        tracing::info!("coordination informer registration finished");
        handle
    } else {
        tracing::info!(step, "coordination disabled, using fallback implementations");
        CoordinatorHandle::disabled()
    };

    // Every informer is registered at this point; later registrations
    // would race their first events.
    informers.start();

    step += 1;
    tracing::info!(step, "building reverse proxy handler");
    let proxy = HubProxyHandler::new(
        &cfg,
        cache.clone(),
        &transport,
        cloud_checker.clone(),
        tenant.clone(),
        coordinator.clone(),
    )?;

    if cfg.network.enabled {
        step += 1;
        tracing::info!(step, "starting network manager");
        NetworkManager::new(&cfg.network, &cfg.listener).run(&shutdown);
    }

    step += 1;
    tracing::info!(step, "starting hub server");
    run_hub_servers(&cfg, proxy, rest_config, &shutdown).await?;

    cert_manager.stop();
    tracing::info!("hub agent exited");
    Ok(())
}
