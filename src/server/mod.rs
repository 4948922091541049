//! Listener/server layer.
//!
//! Serves the proxy router plus the hub's own endpoints (`/v1/healthz`,
//! `/v1/readyz`) on one listener, with optional TLS, until the process-wide
//! shutdown signal fires. The serve call is the bootstrap sequence's final,
//! blocking step; returning from it is the normal exit path, not an error.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::client::RestConfigManager;
use crate::config::HubConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::proxy::HubProxyHandler;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid bind address {0}")]
    InvalidBindAddress(String),

    #[error("failed to load listener TLS material: {0}")]
    Tls(#[source] std::io::Error),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
struct HubState {
    rest_config: Arc<RestConfigManager>,
}

/// Serve until the shutdown signal fires.
pub async fn run_hub_servers(
    cfg: &HubConfig,
    proxy: HubProxyHandler,
    rest_config: Arc<RestConfigManager>,
    shutdown: &Shutdown,
) -> Result<(), ServerError> {
    let hub_routes = Router::new()
        .route("/v1/healthz", get(healthz))
        .route("/v1/readyz", get(readyz))
        .with_state(HubState { rest_config });
    let app = hub_routes.merge(proxy.into_router());

    match &cfg.listener.tls {
        Some(tls) => {
            let addr: SocketAddr = cfg
                .listener
                .bind_address
                .parse()
                .map_err(|_| ServerError::InvalidBindAddress(cfg.listener.bind_address.clone()))?;
            let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(ServerError::Tls)?;
            tracing::info!(address = %addr, "hub server starting (tls)");

            let handle = axum_server::Handle::new();
            let watcher = handle.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown.triggered().await;
                watcher.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
            });

            axum_server::bind_rustls(addr, rustls)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            let listener = TcpListener::bind(&cfg.listener.bind_address).await?;
            let addr = listener.local_addr()?;
            tracing::info!(address = %addr, "hub server starting");

            let shutdown = shutdown.clone();
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.triggered().await })
                .await?;
        }
    }

    tracing::info!("hub server stopped");
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Ready means a usable remote endpoint config exists right now.
async fn readyz(State(state): State<HubState>) -> impl IntoResponse {
    match state.rest_config.current_config() {
        Some(config) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "endpoint": config.base_url.as_str() })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unready", "reason": "no healthy remote endpoint" })),
        ),
    }
}
