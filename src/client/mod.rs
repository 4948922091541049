//! API clients for remote endpoints.
//!
//! # Responsibilities
//! - One client per remote endpoint, all sharing the primary transport
//! - Heartbeat probes with a fixed per-request timeout
//! - Lease claims against the coordination endpoint

pub mod rest;

use std::collections::HashMap;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use thiserror::Error;
use url::Url;

use crate::transport::{HttpClient, TransportManager};

pub use rest::{ApiServerConfig, RestConfigManager};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("endpoint {0} is not an absolute http(s) URL")]
    InvalidEndpoint(String),

    #[error("failed to build request for {0}")]
    Request(String),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("request to {0} timed out")]
    Timeout(String),
}

/// A thin API client bound to one endpoint and the shared transport.
#[derive(Clone)]
pub struct ApiClient {
    base: Url,
    http: HttpClient,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base: Url, http: HttpClient, timeout: Duration) -> Result<Self, ClientError> {
        if !matches!(base.scheme(), "http" | "https") || base.host_str().is_none() {
            return Err(ClientError::InvalidEndpoint(base.to_string()));
        }
        Ok(Self { base, http, timeout })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    async fn request(&self, method: Method, path: &str) -> Result<StatusCode, ClientError> {
        let url = self
            .base
            .join(path)
            .map_err(|_| ClientError::InvalidEndpoint(format!("{}{path}", self.base)))?;
        let request = Request::builder()
            .method(method)
            .uri(url.as_str())
            .header("user-agent", "edgehub")
            .body(Body::empty())
            .map_err(|_| ClientError::Request(url.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.http.request(request))
            .await
            .map_err(|_| ClientError::Timeout(url.to_string()))?
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        Ok(response.status())
    }

    /// Probe the endpoint's health path. Returns the response status.
    pub async fn healthz(&self, path: &str) -> Result<StatusCode, ClientError> {
        self.request(Method::GET, path.trim_start_matches('/')).await
    }

    /// Try to claim the node's coordination lease.
    ///
    /// `Ok(true)` means this node holds the lease; a conflict means another
    /// hub holds it.
    pub async fn claim_lease(&self, node_name: &str) -> Result<bool, ClientError> {
        let status = self
            .request(Method::PUT, &format!("v1/leases/{node_name}"))
            .await?;
        Ok(status.is_success())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Build one API client per remote endpoint, keyed by the endpoint's string
/// form, all bound to the shared transport with the heartbeat timeout.
///
/// Fails fast on the first bad endpoint; callers treat any error as fatal to
/// startup, so no partial map is returned. The coordination endpoint is not
/// handled here: its client is built inside the coordination bootstrap on a
/// separately-prepared transport.
pub fn create_clients(
    heartbeat_timeout_secs: u64,
    remote_servers: &[Url],
    transport: &TransportManager,
) -> Result<HashMap<String, ApiClient>, ClientError> {
    let timeout = Duration::from_secs(heartbeat_timeout_secs);
    let mut clients = HashMap::with_capacity(remote_servers.len());
    for server in remote_servers {
        let client = ApiClient::new(server.clone(), transport.current_transport(), timeout)?;
        clients.insert(server.to_string(), client);
    }
    Ok(clients)
}
