//! Reverse-proxy request handling.
//!
//! # Responsibilities
//! - Forward requests to the first healthy remote endpoint
//! - Fall back to the coordination endpoint when the cloud is down and the
//!   coordinator is healthy
//! - Fall back to the local cache for GETs when nothing is reachable
//! - Inject the tenant service-account token into credential-less requests
//! - Tag every request with a request ID
//!
//! # Design Decisions
//! - Coordination components are resolved through the handle on every
//!   request, never captured at construction: the subsystem may become
//!   ready long after the server started
//! - Responses are streamed; only small, cacheable GET bodies are buffered

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, uri::Scheme, HeaderValue, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use thiserror::Error;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use url::Url;
use uuid::Uuid;

use crate::cache::CacheManager;
use crate::config::HubConfig;
use crate::coordinator::CoordinatorHandle;
use crate::health::BackendHealthChecker;
use crate::observability::metrics;
use crate::tenant::TenantManager;
use crate::transport::{HttpClient, TransportManager};

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no remote servers to proxy to")]
    NoRemoteServers,
}

/// State shared by every proxied request.
#[derive(Clone)]
pub struct ProxyState {
    servers: Arc<Vec<Url>>,
    coordination_url: Option<Url>,
    client: HttpClient,
    checker: Arc<dyn BackendHealthChecker>,
    cache: Option<Arc<CacheManager>>,
    tenant: Arc<TenantManager>,
    coordinator: CoordinatorHandle,
}

/// Where one request is about to be sent.
#[derive(Debug)]
pub(crate) enum Target {
    /// A healthy remote endpoint, via the primary transport.
    Remote(Url),
    /// The coordination endpoint, via the coordination transport.
    Coordinator(Url),
    /// Nothing reachable; only the cache can answer.
    None,
}

/// The hub's reverse-proxy layer.
pub struct HubProxyHandler {
    state: ProxyState,
    request_timeout: Duration,
}

impl HubProxyHandler {
    pub fn new(
        cfg: &HubConfig,
        cache: Option<Arc<CacheManager>>,
        transport: &TransportManager,
        checker: Arc<dyn BackendHealthChecker>,
        tenant: Arc<TenantManager>,
        coordinator: CoordinatorHandle,
    ) -> Result<Self, ProxyError> {
        if cfg.remote_servers.is_empty() {
            return Err(ProxyError::NoRemoteServers);
        }
        Ok(Self {
            state: ProxyState {
                servers: Arc::new(cfg.remote_servers.clone()),
                coordination_url: cfg.coordination.server_url.clone(),
                client: transport.current_transport(),
                checker,
                cache,
                tenant,
                coordinator,
            },
            request_timeout: Duration::from_secs(cfg.listener.request_timeout_secs),
        })
    }

    /// Build the axum router for this handler.
    pub fn into_router(self) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(self.state)
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(TraceLayer::new_for_http())
    }
}

/// Decide where a request goes right now.
///
/// The coordination getters are re-invoked here on every call: a
/// coordinator that became ready after server start must be picked up by
/// the next request, and one that failed must stop being offered.
pub(crate) fn pick_target(state: &ProxyState) -> Target {
    if let Some(server) = state
        .servers
        .iter()
        .find(|server| state.checker.backend_is_healthy(server))
    {
        return Target::Remote(server.clone());
    }

    let coordinator_usable = state
        .coordinator
        .health_checker()
        .map(|checker| checker.is_healthy())
        .unwrap_or(false)
        && state.coordinator.transport().is_some();
    if coordinator_usable {
        if let Some(url) = &state.coordination_url {
            return Target::Coordinator(url.clone());
        }
    }

    Target::None
}

async fn proxy_handler(State(state): State<ProxyState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let method_str = method.to_string();
    let cache_key = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match pick_target(&state) {
        Target::Remote(base) => {
            forward(&state, state.client.clone(), base, request, &request_id, start).await
        }
        Target::Coordinator(base) => {
            // Getter indirection: the transport is resolved per request.
            let Some(transport) = state.coordinator.transport() else {
                return serve_degraded(&state, &method, &cache_key, &method_str, start).await;
            };
            tracing::debug!(request_id = %request_id, "cloud unreachable, forwarding to coordination endpoint");
            forward(&state, transport.current_transport(), base, request, &request_id, start).await
        }
        Target::None => serve_degraded(&state, &method, &cache_key, &method_str, start).await,
    }
}

async fn forward(
    state: &ProxyState,
    client: HttpClient,
    base: Url,
    request: Request<Body>,
    request_id: &str,
    start: Instant,
) -> Response {
    let method = request.method().clone();
    let method_str = method.to_string();
    let cache_key = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let target_label = base.to_string();

    let (mut parts, body) = request.into_parts();

    // Rewrite the URI onto the target endpoint, keeping path and query.
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(if base.scheme() == "https" {
        Scheme::HTTPS
    } else {
        Scheme::HTTP
    });
    let authority = match base.port_or_known_default() {
        Some(port) => format!("{}:{}", base.host_str().unwrap_or_default(), port),
        None => base.host_str().unwrap_or_default().to_string(),
    };
    uri_parts.authority = match authority.parse() {
        Ok(authority) => Some(authority),
        Err(_) => {
            tracing::error!(request_id, target = %target_label, "unusable target authority");
            return (StatusCode::BAD_GATEWAY, "unusable upstream address").into_response();
        }
    };
    let uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(_) => {
            return (StatusCode::BAD_GATEWAY, "unusable upstream address").into_response();
        }
    };
    parts.uri = uri;

    if let Ok(value) = HeaderValue::from_str(request_id) {
        parts.headers.insert("x-request-id", value);
    }

    // Requests without credentials get the tenant service-account token.
    if !parts.headers.contains_key(header::AUTHORIZATION) {
        if let Some(token) = state.tenant.current_token() {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                parts.headers.insert(header::AUTHORIZATION, value);
            }
        }
    }

    let upstream_request = Request::from_parts(parts, body);
    match client.request(upstream_request).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_proxied_request(&method_str, status.as_u16(), &target_label, start);

            let (parts, body) = response.into_parts();
            if let Some(cache) = cacheable(state, &method, status, &parts.headers) {
                match axum::body::to_bytes(Body::new(body), cache.max_entry_bytes()).await {
                    Ok(bytes) => {
                        if let Err(e) = cache.store(&cache_key, &bytes).await {
                            tracing::warn!(error = %e, "failed to cache response");
                        }
                        return Response::from_parts(parts, Body::from(bytes)).into_response();
                    }
                    Err(_) => {
                        return (StatusCode::BAD_GATEWAY, "upstream body read failed")
                            .into_response();
                    }
                }
            }
            Response::from_parts(parts, Body::new(body)).into_response()
        }
        Err(e) => {
            tracing::warn!(request_id, target = %target_label, error = %e, "upstream request failed");
            metrics::record_proxied_request(&method_str, 502, &target_label, start);
            (StatusCode::BAD_GATEWAY, "upstream request failed").into_response()
        }
    }
}

/// Whether this response should be written to the local cache.
fn cacheable<'a>(
    state: &'a ProxyState,
    method: &Method,
    status: StatusCode,
    headers: &header::HeaderMap,
) -> Option<&'a Arc<CacheManager>> {
    let cache = state.cache.as_ref()?;
    if *method != Method::GET || !status.is_success() {
        return None;
    }
    // Only bodies with a declared length within the cache's entry limit are
    // buffered; anything else streams through untouched.
    let length: usize = headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()?;
    (length <= cache.max_entry_bytes()).then_some(cache)
}

/// Nothing reachable: serve GETs from the cache if possible.
async fn serve_degraded(
    state: &ProxyState,
    method: &Method,
    cache_key: &str,
    method_str: &str,
    start: Instant,
) -> Response {
    if *method == Method::GET {
        if let Some(cache) = &state.cache {
            if let Some(body) = cache.load(cache_key).await {
                tracing::debug!(key = cache_key, "serving cached response, no endpoint reachable");
                metrics::record_proxied_request(method_str, 200, "cache", start);
                let mut response = (StatusCode::OK, body).into_response();
                response
                    .headers_mut()
                    .insert("x-edgehub-source", HeaderValue::from_static("cache"));
                return response;
            }
        }
    }
    metrics::record_proxied_request(method_str, 503, "none", start);
    (StatusCode::SERVICE_UNAVAILABLE, "no healthy remote endpoint").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TenantConfig;
    use crate::health::FakeChecker;
    use crate::informers::SharedInformerFactory;
    use crate::lifecycle::shutdown::Shutdown;
    use crate::transport::test_support::test_transport;

    fn proxy_state(
        checker: Arc<dyn BackendHealthChecker>,
        coordinator: CoordinatorHandle,
    ) -> ProxyState {
        let transport = test_transport();
        let informers = SharedInformerFactory::new();
        let shutdown = Shutdown::new();
        let tenant = TenantManager::new(&TenantConfig::default(), &informers, &shutdown);
        ProxyState {
            servers: Arc::new(vec![Url::parse("http://10.0.0.1:6443").unwrap()]),
            coordination_url: Some(Url::parse("http://10.0.1.1:6444").unwrap()),
            client: transport.current_transport(),
            checker,
            cache: None,
            tenant,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_healthy_backend_wins() {
        let state = proxy_state(
            Arc::new(FakeChecker::new(true)),
            CoordinatorHandle::disabled(),
        );
        assert!(matches!(pick_target(&state), Target::Remote(_)));
    }

    #[tokio::test]
    async fn test_disabled_coordination_means_no_fallback() {
        // The disabled handle's fallback checker reports unhealthy, so the
        // coordination route must never be chosen.
        let state = proxy_state(
            Arc::new(FakeChecker::new(false)),
            CoordinatorHandle::disabled(),
        );
        assert!(matches!(pick_target(&state), Target::None));
    }

    #[tokio::test]
    async fn test_ready_coordinator_serves_degraded_cloud() {
        use crate::coordinator::FakeCoordinator;

        // Simulate a published, healthy coordination subsystem.
        let handle = CoordinatorHandle::bootstrapping();
        handle.publish_ready(
            Arc::new(test_transport()),
            Arc::new(FakeChecker::new(true)),
            Arc::new(FakeCoordinator),
        );
        let state = proxy_state(Arc::new(FakeChecker::new(false)), handle);
        assert!(matches!(pick_target(&state), Target::Coordinator(_)));
    }

    #[tokio::test]
    async fn test_coordinator_becoming_ready_is_observed_later() {
        let handle = CoordinatorHandle::bootstrapping();
        let state = proxy_state(Arc::new(FakeChecker::new(false)), handle.clone());

        // Before publication the getters resolve to nothing.
        assert!(matches!(pick_target(&state), Target::None));

        use crate::coordinator::FakeCoordinator;
        handle.publish_ready(
            Arc::new(test_transport()),
            Arc::new(FakeChecker::new(true)),
            Arc::new(FakeCoordinator),
        );

        // Same state, same getters, new answer.
        assert!(matches!(pick_target(&state), Target::Coordinator(_)));
    }
}
