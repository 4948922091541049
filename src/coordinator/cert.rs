//! Certificate management for the coordination endpoint.
//!
//! The coordination subsystem authenticates with two client certificates —
//! one for the API surface, one for node-lease proxying — delivered into a
//! PKI directory by an external issuer. Construction registers a watcher
//! informer for that directory; the informer-registration barrier in the
//! bootstrap sequence depends on this registration happening inside the
//! constructor, before anything else in the coordination bootstrap.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use thiserror::Error;

use crate::informers::SharedInformerFactory;
use crate::lifecycle::shutdown::Shutdown;
use crate::transport::{parse_identity, CertManager, ClientIdentity};

const PKI_WATCH_INTERVAL: Duration = Duration::from_secs(10);

const API_SERVER_CLIENT_CERT: &str = "apiserver-client.crt";
const API_SERVER_CLIENT_KEY: &str = "apiserver-client.key";
const LEASE_PROXY_CLIENT_CERT: &str = "lease-proxy-client.crt";
const LEASE_PROXY_CLIENT_KEY: &str = "lease-proxy-client.key";

#[derive(Debug, Error)]
pub enum CertError {
    #[error("failed to prepare coordination pki dir {dir}: {source}")]
    PkiDir {
        dir: String,
        #[source]
        source: std::io::Error,
    },
}

/// Watches the coordination PKI directory and holds the two client
/// identities once their material appears.
pub struct CoordinationCertManager {
    pki_dir: PathBuf,
    api_server_identity: ArcSwapOption<ClientIdentity>,
    lease_proxy_identity: ArcSwapOption<ClientIdentity>,
    stopped: AtomicBool,
}

impl std::fmt::Debug for CoordinationCertManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinationCertManager")
            .field("pki_dir", &self.pki_dir)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl CoordinationCertManager {
    /// Build the manager and register its directory watcher informer.
    pub fn new(
        pki_dir: &Path,
        informers: &SharedInformerFactory,
        shutdown: &Shutdown,
    ) -> Result<Arc<Self>, CertError> {
        std::fs::create_dir_all(pki_dir).map_err(|source| CertError::PkiDir {
            dir: pki_dir.display().to_string(),
            source,
        })?;

        let manager = Arc::new(Self {
            pki_dir: pki_dir.to_path_buf(),
            api_server_identity: ArcSwapOption::empty(),
            lease_proxy_identity: ArcSwapOption::empty(),
            stopped: AtomicBool::new(false),
        });
        manager.reload();

        let watcher = manager.clone();
        let shutdown = shutdown.clone();
        informers.register("coordination-pki", async move {
            let mut ticker = tokio::time::interval(PKI_WATCH_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => watcher.reload(),
                    _ = shutdown.triggered() => break,
                }
            }
        });

        Ok(manager)
    }

    /// Re-read both certificate pairs from the PKI directory. Pairs that
    /// are missing or unparseable leave the previous value in place.
    fn reload(&self) {
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        self.reload_pair(
            API_SERVER_CLIENT_CERT,
            API_SERVER_CLIENT_KEY,
            &self.api_server_identity,
        );
        self.reload_pair(
            LEASE_PROXY_CLIENT_CERT,
            LEASE_PROXY_CLIENT_KEY,
            &self.lease_proxy_identity,
        );
    }

    fn reload_pair(&self, cert_name: &str, key_name: &str, cell: &ArcSwapOption<ClientIdentity>) {
        let cert_path = self.pki_dir.join(cert_name);
        let key_path = self.pki_dir.join(key_name);
        let (Ok(cert_pem), Ok(key_pem)) = (std::fs::read(&cert_path), std::fs::read(&key_path))
        else {
            return;
        };
        match parse_identity(&cert_pem, &key_pem) {
            Ok(identity) => {
                if cell.load().is_none() {
                    tracing::info!(cert = cert_name, "coordination client certificate loaded");
                }
                cell.store(Some(Arc::new(identity)));
            }
            Err(e) => {
                tracing::warn!(cert = cert_name, error = %e, "unusable coordination certificate material");
            }
        }
    }

    /// The API-server client certificate, once present.
    pub fn api_server_client_cert(&self) -> Option<ClientIdentity> {
        self.api_server_identity.load_full().map(|i| (*i).clone())
    }

    /// The node-lease-proxy client certificate, once present.
    pub fn node_lease_proxy_client_cert(&self) -> Option<ClientIdentity> {
        self.lease_proxy_identity.load_full().map(|i| (*i).clone())
    }
}

impl CertManager for CoordinationCertManager {
    fn current_identity(&self) -> Option<ClientIdentity> {
        self.api_server_client_cert()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        tracing::debug!("coordination certificate manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_support::{CERT_PEM, KEY_PEM};

    fn write_pair(dir: &Path, cert_name: &str, key_name: &str) {
        std::fs::write(dir.join(cert_name), CERT_PEM).unwrap();
        std::fs::write(dir.join(key_name), KEY_PEM).unwrap();
    }

    #[tokio::test]
    async fn test_construction_registers_informer() {
        let dir = tempfile::tempdir().unwrap();
        let informers = SharedInformerFactory::new();
        let shutdown = Shutdown::new();

        let manager =
            CoordinationCertManager::new(dir.path(), &informers, &shutdown).unwrap();
        assert_eq!(informers.pending_count(), 1);
        assert!(manager.api_server_client_cert().is_none());
        assert!(manager.node_lease_proxy_client_cert().is_none());
    }

    #[tokio::test]
    async fn test_construction_fails_when_dir_unusable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let informers = SharedInformerFactory::new();
        let shutdown = Shutdown::new();
        let err =
            CoordinationCertManager::new(&blocker.join("pki"), &informers, &shutdown).unwrap_err();
        assert!(matches!(err, CertError::PkiDir { .. }));
    }

    #[tokio::test]
    async fn test_reload_picks_up_material() {
        let dir = tempfile::tempdir().unwrap();
        let informers = SharedInformerFactory::new();
        let shutdown = Shutdown::new();
        let manager =
            CoordinationCertManager::new(dir.path(), &informers, &shutdown).unwrap();

        write_pair(dir.path(), API_SERVER_CLIENT_CERT, API_SERVER_CLIENT_KEY);
        manager.reload();
        assert!(manager.api_server_client_cert().is_some());
        assert!(manager.current_identity().is_some());
        assert!(manager.node_lease_proxy_client_cert().is_none());

        write_pair(dir.path(), LEASE_PROXY_CLIENT_CERT, LEASE_PROXY_CLIENT_KEY);
        manager.reload();
        assert!(manager.node_lease_proxy_client_cert().is_some());
    }

    #[tokio::test]
    async fn test_material_present_at_construction_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        write_pair(dir.path(), API_SERVER_CLIENT_CERT, API_SERVER_CLIENT_KEY);
        write_pair(dir.path(), LEASE_PROXY_CLIENT_CERT, LEASE_PROXY_CLIENT_KEY);

        let informers = SharedInformerFactory::new();
        let shutdown = Shutdown::new();
        let manager =
            CoordinationCertManager::new(dir.path(), &informers, &shutdown).unwrap();
        assert!(manager.api_server_client_cert().is_some());
        assert!(manager.node_lease_proxy_client_cert().is_some());
    }
}
