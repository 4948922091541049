//! End-to-end bootstrap tests for the hub.

use std::net::SocketAddr;
use std::time::Duration;

use edgehub::config::{HubConfig, NodeMode};
use edgehub::lifecycle::bootstrap;
use edgehub::Shutdown;
use url::Url;

mod common;

fn base_config(
    dir: &std::path::Path,
    backend: SocketAddr,
    proxy: SocketAddr,
    mode: NodeMode,
) -> HubConfig {
    let (cert_path, key_path) = common::write_client_certs(dir);

    let mut cfg = HubConfig::default();
    cfg.node_name = "test-node".into();
    cfg.mode = mode;
    cfg.remote_servers = vec![Url::parse(&format!("http://{backend}")).unwrap()];
    cfg.heartbeat_timeout_secs = 1;
    cfg.certificates.cert_path = cert_path;
    cfg.certificates.key_path = key_path;
    cfg.cache.root_dir = dir.join("cache");
    cfg.listener.bind_address = proxy.to_string();
    cfg.health_check.interval_secs = 1;
    cfg.health_check.timeout_secs = 1;
    cfg.observability.metrics_enabled = false;
    cfg
}

#[tokio::test]
async fn test_edge_bootstrap_serves_and_shuts_down_cleanly() {
    let backend_addr: SocketAddr = "127.0.0.1:28431".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28432".parse().unwrap();
    common::start_mock_backend(backend_addr, "backend-ok").await;

    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(dir.path(), backend_addr, proxy_addr, NodeMode::Edge);
    let cache_root = cfg.cache.root_dir.clone();

    let shutdown = Shutdown::new();
    let hub = tokio::spawn(bootstrap::run(cfg, shutdown.clone()));

    let client = common::test_client();
    assert!(
        common::wait_for_status(&client, &format!("http://{proxy_addr}/v1/healthz"), 200).await,
        "hub server must come up"
    );

    // Proxied traffic reaches the backend.
    let response = client
        .get(format!("http://{proxy_addr}/api/v1/nodes"))
        .send()
        .await
        .expect("hub reachable");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "backend-ok");

    // Edge mode opened the cache.
    assert!(cache_root.exists());

    // Readiness reflects the healthy remote endpoint.
    let ready = client
        .get(format!("http://{proxy_addr}/v1/readyz"))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), 200);

    // Ordinary shutdown is a clean exit, not an error.
    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(10), hub)
        .await
        .expect("hub must exit after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cloud_mode_constructs_no_cache() {
    let backend_addr: SocketAddr = "127.0.0.1:28433".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28434".parse().unwrap();
    common::start_mock_backend(backend_addr, "cloud-ok").await;

    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(dir.path(), backend_addr, proxy_addr, NodeMode::Cloud);
    let cache_root = cfg.cache.root_dir.clone();

    let shutdown = Shutdown::new();
    let hub = tokio::spawn(bootstrap::run(cfg, shutdown.clone()));

    let client = common::test_client();
    assert!(common::wait_for_status(&client, &format!("http://{proxy_addr}/v1/healthz"), 200).await);

    // The stand-in checker reports the cloud healthy without probing, so
    // traffic flows and readiness holds.
    let response = client
        .get(format!("http://{proxy_addr}/whatever"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let ready = client
        .get(format!("http://{proxy_addr}/v1/readyz"))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), 200);

    // No cache manager was constructed: the root was never created.
    assert!(!cache_root.exists());

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(10), hub)
        .await
        .expect("hub must exit after shutdown")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_enabled_coordination_does_not_block_startup() {
    let backend_addr: SocketAddr = "127.0.0.1:28435".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28436".parse().unwrap();
    common::start_mock_backend(backend_addr, "backend-ok").await;

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = base_config(dir.path(), backend_addr, proxy_addr, NodeMode::Edge);
    // Coordination points at a dead endpoint and an empty PKI directory:
    // its certificate poll will spin in the background for minutes. The
    // primary path must come up regardless.
    cfg.coordination.enabled = true;
    cfg.coordination.server_url = Some(Url::parse("http://127.0.0.1:1").unwrap());
    cfg.coordination.pki_dir = dir.path().join("pki");

    let shutdown = Shutdown::new();
    let hub = tokio::spawn(bootstrap::run(cfg, shutdown.clone()));

    let client = common::test_client();
    assert!(
        common::wait_for_status(&client, &format!("http://{proxy_addr}/v1/healthz"), 200).await,
        "informer registration must not wait for the certificate poll"
    );
    let response = client
        .get(format!("http://{proxy_addr}/api/v1/pods"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    shutdown.trigger();
    let result = tokio::time::timeout(Duration::from_secs(10), hub)
        .await
        .expect("hub must exit with coordination bootstrap still pending")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_missing_certificates_abort_startup() {
    let backend_addr: SocketAddr = "127.0.0.1:28437".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28438".parse().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut cfg = base_config(dir.path(), backend_addr, proxy_addr, NodeMode::Edge);
    cfg.certificates.cert_path = dir.path().join("missing.crt");
    cfg.certificates.key_path = dir.path().join("missing.key");

    let shutdown = Shutdown::new();
    let result = tokio::time::timeout(Duration::from_secs(10), bootstrap::run(cfg, shutdown))
        .await
        .expect("startup failure must be prompt");
    assert!(matches!(
        result,
        Err(bootstrap::BootstrapError::Transport(_))
    ));
}

#[tokio::test]
async fn test_pre_fired_shutdown_exits_promptly() {
    let backend_addr: SocketAddr = "127.0.0.1:28439".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:28440".parse().unwrap();
    common::start_mock_backend(backend_addr, "backend-ok").await;

    let dir = tempfile::tempdir().unwrap();
    let cfg = base_config(dir.path(), backend_addr, proxy_addr, NodeMode::Edge);

    let shutdown = Shutdown::new();
    shutdown.trigger();

    let result = tokio::time::timeout(Duration::from_secs(10), bootstrap::run(cfg, shutdown))
        .await
        .expect("a pre-fired signal must produce a prompt clean exit");
    assert!(result.is_ok());
}
